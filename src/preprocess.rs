//! Entropy-reducing preprocessing applied before encoding.
//!
//! Four stages run in a fixed order, each mutating the buffer in place:
//!
//! 1. **Chroma subsampling** — 2x2 block chroma averaging, blended with the
//!    original at [`PipelineOptions::chroma_strength`].
//! 2. **Edge-aware blur** — Gaussian smoothing of pixels whose edge strength
//!    is below a threshold; edges stay untouched.
//! 3. **Color quantization** — per-channel rounding to `256 / levels` steps.
//! 4. **Adaptive sharpening** — edge-weighted unsharp mask, only for
//!    photo-classified images downscaled past a scale threshold.
//!
//! The edge map must be computed from the bitmap *before* stage 1 runs; it
//! is reused unchanged by stages 2 and 4. Alpha is never touched — the
//! stages shape color entropy, not coverage.

use crate::analyze::{AnalysisReport, ImageType};
use crate::buffer::PixelBuffer;
use crate::edges::EdgeMap;

/// Tuning knobs for the preprocessing stages.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Blend factor of the chroma-averaged result over the original.
    pub chroma_strength: f32,
    /// Gaussian sigma for the selective blur.
    pub blur_sigma: f32,
    /// Edge strength below which a pixel is blurred.
    pub blur_edge_threshold: f32,
    /// Quantization levels per channel (2-256).
    pub quant_levels: u32,
    /// Edge strength above which a pixel is sharpened.
    pub sharpen_edge_threshold: f32,
    /// Unsharp-mask push per unit of edge strength.
    pub sharpen_strength: f32,
    /// Sharpening only kicks in when the version is scaled below this
    /// fraction of the source's longer edge.
    pub sharpen_scale_threshold: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chroma_strength: 0.75,
            blur_sigma: 0.8,
            blur_edge_threshold: 0.22,
            quant_levels: 220,
            sharpen_edge_threshold: 0.12,
            sharpen_strength: 0.45,
            sharpen_scale_threshold: 0.6,
        }
    }
}

/// Run all stages on `buffer` in place.
///
/// `edges` must have been computed from this buffer before any mutation and
/// match its dimensions. `scale` is the downscale ratio of this version
/// relative to the source (1.0 = unscaled).
pub fn preprocess(
    buffer: &mut PixelBuffer,
    edges: &EdgeMap,
    report: &AnalysisReport,
    scale: f32,
    opts: &PipelineOptions,
) {
    subsample_chroma(buffer, opts.chroma_strength);
    selective_blur(buffer, edges, opts.blur_sigma, opts.blur_edge_threshold);
    quantize_colors(buffer, opts.quant_levels);
    if report.image_type == ImageType::Photo && scale < opts.sharpen_scale_threshold {
        adaptive_sharpen(
            buffer,
            edges,
            opts.sharpen_edge_threshold,
            opts.sharpen_strength,
        );
    }
}

/// BT.601 luma of one pixel.
#[inline]
fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Average the chroma of each non-overlapping 2x2 block while keeping
/// per-pixel luma, then blend the reconstruction over the original.
/// Odd trailing rows/columns fall outside any block and are left alone.
pub fn subsample_chroma(buffer: &mut PixelBuffer, strength: f32) {
    let width = buffer.width();
    let height = buffer.height();

    let mut by = 0;
    while by + 1 < height {
        let mut bx = 0;
        while bx + 1 < width {
            let offsets = [
                buffer.offset(bx, by),
                buffer.offset(bx + 1, by),
                buffer.offset(bx, by + 1),
                buffer.offset(bx + 1, by + 1),
            ];

            let mut lumas = [0.0f32; 4];
            let mut cb_sum = 0.0f32;
            let mut cr_sum = 0.0f32;
            {
                let data = buffer.data();
                for (i, &off) in offsets.iter().enumerate() {
                    let r = data[off] as f32;
                    let g = data[off + 1] as f32;
                    let b = data[off + 2] as f32;
                    let y = luma(r, g, b);
                    lumas[i] = y;
                    cb_sum += b - y;
                    cr_sum += r - y;
                }
            }
            let cb = cb_sum / 4.0;
            let cr = cr_sum / 4.0;

            let data = buffer.data_mut();
            for (i, &off) in offsets.iter().enumerate() {
                let y = lumas[i];
                let r_rec = y + cr;
                let b_rec = y + cb;
                let g_rec = (y - 0.299 * r_rec - 0.114 * b_rec) / 0.587;
                for (c, rec) in [r_rec, g_rec, b_rec].into_iter().enumerate() {
                    let orig = data[off + c] as f32;
                    let blended = orig + (rec.clamp(0.0, 255.0) - orig) * strength;
                    data[off + c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }

            bx += 2;
        }
        by += 2;
    }
}

/// Normalized 2D Gaussian kernel for `sigma`, radius `ceil(sigma * 3)`.
/// Recomputed per invocation; weights sum to 1.
fn gaussian_kernel(sigma: f32) -> (Vec<f32>, i64) {
    let radius = (sigma * 3.0).ceil().max(1.0) as i64;
    let side = (2 * radius + 1) as usize;
    let mut weights = vec![0.0f32; side * side];
    let denom = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let w = (-((dx * dx + dy * dy) as f32) / denom).exp();
            weights[((dy + radius) * (2 * radius + 1) + (dx + radius)) as usize] = w;
            sum += w;
        }
    }
    for w in &mut weights {
        *w /= sum;
    }
    (weights, radius)
}

/// Gaussian-blur every pixel whose edge strength is below `edge_threshold`.
/// Pixels at or above the threshold keep their exact value. Reads from a
/// snapshot so the blur never cascades along the scan direction.
pub fn selective_blur(buffer: &mut PixelBuffer, edges: &EdgeMap, sigma: f32, edge_threshold: f32) {
    let (kernel, radius) = gaussian_kernel(sigma);
    let width = buffer.width() as i64;
    let height = buffer.height() as i64;
    let snapshot = buffer.data().to_vec();
    let data = buffer.data_mut();
    let side = 2 * radius + 1;

    for y in 0..height {
        for x in 0..width {
            if edges.get(x as u32, y as u32) >= edge_threshold {
                continue;
            }
            let mut acc = [0.0f32; 3];
            let mut weight = 0.0f32;
            for dy in -radius..=radius {
                let sy = y + dy;
                if sy < 0 || sy >= height {
                    continue;
                }
                for dx in -radius..=radius {
                    let sx = x + dx;
                    if sx < 0 || sx >= width {
                        continue;
                    }
                    let w = kernel[((dy + radius) * side + (dx + radius)) as usize];
                    let off = ((sy * width + sx) * 4) as usize;
                    acc[0] += snapshot[off] as f32 * w;
                    acc[1] += snapshot[off + 1] as f32 * w;
                    acc[2] += snapshot[off + 2] as f32 * w;
                    weight += w;
                }
            }
            // Near borders part of the kernel falls outside; renormalize by
            // the in-bounds weight so flat regions stay flat.
            let off = ((y * width + x) * 4) as usize;
            for c in 0..3 {
                data[off + c] = (acc[c] / weight).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Round each R/G/B channel to the nearest multiple of `256 / levels`.
/// Idempotent for a fixed `levels`.
pub fn quantize_colors(buffer: &mut PixelBuffer, levels: u32) {
    let step = 256.0f32 / levels.clamp(2, 256) as f32;
    for px in buffer.data_mut().chunks_exact_mut(4) {
        for c in &mut px[..3] {
            let q = (*c as f32 / step).round() * step;
            *c = q.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Edge-weighted unsharp mask: push interior pixels away from their
/// 4-neighbor average in proportion to edge strength.
pub fn adaptive_sharpen(
    buffer: &mut PixelBuffer,
    edges: &EdgeMap,
    edge_threshold: f32,
    strength: f32,
) {
    let width = buffer.width();
    let height = buffer.height();
    if width < 3 || height < 3 {
        return;
    }
    let snapshot = buffer.data().to_vec();
    let data = buffer.data_mut();

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let edge = edges.get(x, y);
            if edge <= edge_threshold {
                continue;
            }
            let amount = edge * strength;
            let off = (y as usize * width as usize + x as usize) * 4;
            let stride = width as usize * 4;
            for c in 0..3 {
                let center = snapshot[off + c] as f32;
                let avg = (snapshot[off - 4 + c] as f32
                    + snapshot[off + 4 + c] as f32
                    + snapshot[off - stride + c] as f32
                    + snapshot[off + stride + c] as f32)
                    / 4.0;
                let sharpened = center + (center - avg) * amount;
                data[off + c] = sharpened.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
