//! Image content analysis.
//!
//! Samples a bounded probe of the decoded bitmap and derives the statistics
//! that drive every later decision: classification, recommended encoder
//! quality, suggested output format, and a compressibility estimate. The
//! probe is capped at 200x200 samples so analysis cost is independent of
//! source resolution.
//!
//! Classification thresholds deliberately mix strict `<` and `>` — an image
//! with exactly 256 unique colors is *not* a graphic, complexity exactly 5
//! is *not* simple, and complexity exactly 20 is *not* complex. Tests cover
//! both sides of each boundary.

use crate::buffer::PixelBuffer;
use crate::encoder::{Encoder, OutputFormat};
use serde::Serialize;
use std::collections::HashMap;

/// Longest edge of the analysis probe.
const PROBE_MAX_DIM: u32 = 200;

/// Summed |dR|+|dG|+|dB| against the scan-order predecessor above which a
/// pixel counts as an edge transition.
const EDGE_DIFF_THRESHOLD: u32 = 30;

const GRAPHIC_COLOR_LIMIT: u32 = 256;
const SIMPLE_COMPLEXITY_LIMIT: f32 = 5.0;
const COMPLEX_COMPLEXITY_LIMIT: f32 = 20.0;

/// Recommended-quality tiers. Tunable, but the ordering is load-bearing:
/// graphic/simple <= transparent-low-complexity <= complex <= default.
/// Complex is the lowest tier among photo-class images.
pub const QUALITY_GRAPHIC: f32 = 0.55;
pub const QUALITY_TRANSPARENT_SIMPLE: f32 = 0.60;
pub const QUALITY_COMPLEX: f32 = 0.62;
pub const QUALITY_DEFAULT: f32 = 0.68;

/// Content classification of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    /// Natural photograph, moderate gradient density.
    Photo,
    /// Few unique colors: logos, charts, UI captures.
    Graphic,
    /// Continuous-tone but low detail: flat backgrounds, soft gradients.
    Simple,
    /// High edge density: foliage, noise, fine texture.
    Complex,
}

/// Immutable statistics computed once per source image.
///
/// `recommended_quality` and `suggested_format` are pure functions of
/// (complexity, image type, transparency) — re-analyzing the same pixels
/// always yields the same report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Edge transitions per 100 probe pixels. Nominally 0-100 but unbounded
    /// above for pathological content.
    pub complexity: f32,
    pub unique_colors: u32,
    pub image_type: ImageType,
    pub has_transparency: bool,
    pub transparency_ratio: f32,
    pub avg_brightness: f32,
    pub avg_saturation: f32,
    /// Mean scan-order channel delta — the raw signal behind `complexity`.
    pub avg_variation: f32,
    pub recommended_quality: f32,
    pub suggested_format: OutputFormat,
    /// 0-100 estimate of how far below its current size this image can go.
    pub compressibility: u32,
    pub is_low_detail: bool,
    pub is_dark: bool,
    pub is_vibrant: bool,
}

/// Analyze a decoded bitmap.
///
/// Statistics are computed over a probe of at most 200x200 samples taken by
/// nearest-neighbor stride sampling, not over the full image. The encoder is
/// consulted only as a capability probe for the format suggestion; no
/// encoding happens here. Read-only: the bitmap is not touched.
pub fn analyze(buffer: &PixelBuffer, encoder: &impl Encoder) -> AnalysisReport {
    let probe_w = buffer.width().min(PROBE_MAX_DIM);
    let probe_h = buffer.height().min(PROBE_MAX_DIM);
    let total = probe_w as u64 * probe_h as u64;

    let data = buffer.data();
    let mut transparent: u64 = 0;
    let mut colors: HashMap<[u8; 3], u32> = HashMap::new();
    let mut brightness_sum = 0.0f64;
    let mut saturation_sum = 0.0f64;
    let mut edges: u64 = 0;
    let mut variation_sum = 0.0f64;
    let mut prev: Option<[u8; 3]> = None;

    for py in 0..probe_h {
        let sy = py as u64 * buffer.height() as u64 / probe_h as u64;
        for px in 0..probe_w {
            let sx = px as u64 * buffer.width() as u64 / probe_w as u64;
            let off = buffer.offset(sx as u32, sy as u32);
            let (r, g, b, a) = (data[off], data[off + 1], data[off + 2], data[off + 3]);

            if a < 255 {
                transparent += 1;
            }
            *colors.entry([r, g, b]).or_insert(0) += 1;
            brightness_sum += (r as f64 + g as f64 + b as f64) / 3.0;

            let max = r.max(g).max(b);
            if max > 0 {
                let min = r.min(g).min(b);
                saturation_sum += (max - min) as f64 / max as f64 * 100.0;
            }

            if let Some([pr, pg, pb]) = prev {
                let diff = r.abs_diff(pr) as u32 + g.abs_diff(pg) as u32 + b.abs_diff(pb) as u32;
                if diff > EDGE_DIFF_THRESHOLD {
                    edges += 1;
                }
                variation_sum += diff as f64;
            }
            prev = Some([r, g, b]);
        }
    }

    let complexity = (edges as f64 / total as f64 * 100.0) as f32;
    let unique_colors = colors.len() as u32;
    let avg_brightness = (brightness_sum / total as f64) as f32;
    let avg_saturation = (saturation_sum / total as f64) as f32;
    let avg_variation = (variation_sum / total as f64) as f32;
    let has_transparency = transparent > 0;
    let transparency_ratio = (transparent as f64 / total as f64) as f32;

    let image_type = classify(unique_colors, complexity);
    let recommended_quality = recommend_quality(image_type, has_transparency, complexity);
    let suggested_format = suggest_format(image_type, has_transparency, encoder);
    let compressibility = compressibility_score(unique_colors, complexity);

    AnalysisReport {
        complexity,
        unique_colors,
        image_type,
        has_transparency,
        transparency_ratio,
        avg_brightness,
        avg_saturation,
        avg_variation,
        recommended_quality,
        suggested_format,
        compressibility,
        is_low_detail: complexity < 10.0,
        is_dark: avg_brightness < 60.0,
        is_vibrant: avg_saturation > 45.0,
    }
}

/// First matching rule wins. Operator directions are intentional.
fn classify(unique_colors: u32, complexity: f32) -> ImageType {
    if unique_colors < GRAPHIC_COLOR_LIMIT {
        ImageType::Graphic
    } else if complexity < SIMPLE_COMPLEXITY_LIMIT {
        ImageType::Simple
    } else if complexity > COMPLEX_COMPLEXITY_LIMIT {
        ImageType::Complex
    } else {
        ImageType::Photo
    }
}

fn recommend_quality(image_type: ImageType, has_transparency: bool, complexity: f32) -> f32 {
    match image_type {
        ImageType::Graphic | ImageType::Simple => QUALITY_GRAPHIC,
        _ if has_transparency && complexity < 10.0 => QUALITY_TRANSPARENT_SIMPLE,
        ImageType::Complex => QUALITY_COMPLEX,
        _ => QUALITY_DEFAULT,
    }
}

fn suggest_format(
    image_type: ImageType,
    has_transparency: bool,
    encoder: &impl Encoder,
) -> OutputFormat {
    if has_transparency || image_type == ImageType::Graphic {
        OutputFormat::Png
    } else if encoder.format_supported(OutputFormat::WebP) {
        OutputFormat::WebP
    } else {
        OutputFormat::Jpeg
    }
}

/// 50 base, + color-count bonus (first match), + complexity bonus (first
/// match), capped at 100.
fn compressibility_score(unique_colors: u32, complexity: f32) -> u32 {
    let mut score = 50u32;
    score += if unique_colors < 256 {
        30
    } else if unique_colors < 1000 {
        20
    } else if unique_colors < 5000 {
        10
    } else {
        0
    };
    score += if complexity < 5.0 {
        20
    } else if complexity < 10.0 {
        10
    } else {
        0
    };
    score.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::backend::tests::MockEncoder;

    fn buffer_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 4]) -> PixelBuffer {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        PixelBuffer::new(width, height, data).unwrap()
    }

    /// 20x20 buffer with 400 unique colors and no base edges, plus `flips`
    /// isolated blue spikes. Each spike is two scan-order edge transitions,
    /// so complexity = flips * 2 / 400 * 100.
    fn edge_controlled(flips: usize) -> PixelBuffer {
        let spacing = 398 / flips.max(1);
        buffer_from_fn(20, 20, move |x, y| {
            let i = (y * 20 + x) as usize;
            let spiked =
                flips > 0 && i >= 1 && i < 397 && (i - 1) % spacing == 0 && (i - 1) / spacing < flips;
            let b = if spiked { 255 } else { 0 };
            [(i / 2) as u8, (i % 2) as u8, b, 255]
        })
    }

    #[test]
    fn edge_controlled_hits_exact_complexity() {
        let report = analyze(&edge_controlled(10), &MockEncoder::new());
        assert_eq!(report.complexity, 5.0);
        assert!(report.unique_colors >= 256);
    }

    #[test]
    fn flat_fill_is_graphic_with_full_compressibility() {
        let buf = buffer_from_fn(100, 100, |_, _| [40, 90, 200, 255]);
        let report = analyze(&buf, &MockEncoder::new());
        assert_eq!(report.unique_colors, 1);
        assert_eq!(report.image_type, ImageType::Graphic);
        assert_eq!(report.recommended_quality, QUALITY_GRAPHIC);
        assert_eq!(report.compressibility, 100);
        assert_eq!(report.suggested_format, OutputFormat::Png);
        assert!(!report.has_transparency);
    }

    #[test]
    fn exactly_256_colors_is_not_graphic() {
        // 16x16, one distinct red value per pixel, adjacent deltas of 1
        let buf = buffer_from_fn(16, 16, |x, y| [(y * 16 + x) as u8, 0, 0, 255]);
        let report = analyze(&buf, &MockEncoder::new());
        assert_eq!(report.unique_colors, 256);
        assert_eq!(report.image_type, ImageType::Simple);
    }

    #[test]
    fn just_under_256_colors_is_graphic() {
        let buf = buffer_from_fn(16, 16, |x, y| [((y * 16 + x) as u8).min(254), 0, 0, 255]);
        let report = analyze(&buf, &MockEncoder::new());
        assert_eq!(report.unique_colors, 255);
        assert_eq!(report.image_type, ImageType::Graphic);
    }

    #[test]
    fn complexity_exactly_five_is_not_simple() {
        let report = analyze(&edge_controlled(10), &MockEncoder::new());
        assert_eq!(report.complexity, 5.0);
        assert_eq!(report.image_type, ImageType::Photo);
    }

    #[test]
    fn complexity_below_five_is_simple() {
        let report = analyze(&edge_controlled(9), &MockEncoder::new());
        assert_eq!(report.complexity, 4.5);
        assert_eq!(report.image_type, ImageType::Simple);
    }

    #[test]
    fn complexity_exactly_twenty_is_not_complex() {
        let report = analyze(&edge_controlled(40), &MockEncoder::new());
        assert_eq!(report.complexity, 20.0);
        assert_eq!(report.image_type, ImageType::Photo);
    }

    #[test]
    fn complexity_above_twenty_is_complex() {
        let report = analyze(&edge_controlled(41), &MockEncoder::new());
        assert_eq!(report.complexity, 20.5);
        assert_eq!(report.image_type, ImageType::Complex);
        assert_eq!(report.recommended_quality, QUALITY_COMPLEX);
    }

    #[test]
    fn transparency_is_counted_and_ratioed() {
        // Top half translucent
        let buf = buffer_from_fn(10, 10, |_, y| [100, 100, 100, if y < 5 { 128 } else { 255 }]);
        let report = analyze(&buf, &MockEncoder::new());
        assert!(report.has_transparency);
        assert_eq!(report.transparency_ratio, 0.5);
        assert_eq!(report.suggested_format, OutputFormat::Png);
    }

    #[test]
    fn transparent_low_complexity_gets_its_own_tier() {
        // Photo-class (>=256 colors, complexity 5.5) with translucent pixels.
        // Alpha is excluded from the edge diff, so the spikes are unaffected.
        let base = edge_controlled(11);
        let mut data = base.data().to_vec();
        data[3] = 200;
        let buf = PixelBuffer::new(20, 20, data).unwrap();
        let report = analyze(&buf, &MockEncoder::new());
        assert_eq!(report.image_type, ImageType::Photo);
        assert!(report.has_transparency);
        assert_eq!(report.recommended_quality, QUALITY_TRANSPARENT_SIMPLE);
    }

    #[test]
    fn opaque_mid_complexity_photo_gets_default_tier() {
        let report = analyze(&edge_controlled(30), &MockEncoder::new());
        assert_eq!(report.image_type, ImageType::Photo);
        assert_eq!(report.recommended_quality, QUALITY_DEFAULT);
    }

    #[test]
    fn quality_tier_ordering_holds() {
        assert!(QUALITY_GRAPHIC <= QUALITY_TRANSPARENT_SIMPLE);
        assert!(QUALITY_TRANSPARENT_SIMPLE <= QUALITY_COMPLEX);
        assert!(QUALITY_COMPLEX <= QUALITY_DEFAULT);
    }

    #[test]
    fn format_falls_back_when_webp_unsupported() {
        let no_webp = MockEncoder::new();
        let report = analyze(&edge_controlled(30), &no_webp);
        assert_eq!(report.suggested_format, OutputFormat::Jpeg);

        let with_webp = MockEncoder {
            unsupported: vec![],
            ..MockEncoder::new()
        };
        let report = analyze(&edge_controlled(30), &with_webp);
        assert_eq!(report.suggested_format, OutputFormat::WebP);
    }

    #[test]
    fn compressibility_first_match_bonuses() {
        // 400 unique colors (<1000: +20), complexity 5.5 (<10: +10)
        let report = analyze(&edge_controlled(11), &MockEncoder::new());
        assert_eq!(report.compressibility, 80);
    }

    #[test]
    fn probe_bounds_large_images() {
        // 1000x400 flat fill: probe is 200x200, statistics unchanged
        let buf = buffer_from_fn(1000, 400, |_, _| [10, 20, 30, 255]);
        let report = analyze(&buf, &MockEncoder::new());
        assert_eq!(report.unique_colors, 1);
        assert_eq!(report.image_type, ImageType::Graphic);
        assert_eq!(report.complexity, 0.0);
    }

    #[test]
    fn analysis_is_pure() {
        let buf = edge_controlled(25);
        let encoder = MockEncoder::new();
        assert_eq!(analyze(&buf, &encoder), analyze(&buf, &encoder));
    }

    #[test]
    fn brightness_and_saturation_flags() {
        let dark = buffer_from_fn(10, 10, |_, _| [20, 20, 20, 255]);
        let report = analyze(&dark, &MockEncoder::new());
        assert!(report.is_dark);
        assert!(!report.is_vibrant);
        assert_eq!(report.avg_brightness, 20.0);
        assert_eq!(report.avg_saturation, 0.0);

        let vivid = buffer_from_fn(10, 10, |_, _| [250, 30, 30, 255]);
        let report = analyze(&vivid, &MockEncoder::new());
        assert!(!report.is_dark);
        assert!(report.is_vibrant);
    }
}
