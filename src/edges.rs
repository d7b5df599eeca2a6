//! Sobel edge detection.
//!
//! Produces the per-pixel edge-strength map consumed by the selective blur
//! and adaptive sharpening stages of the preprocessing pipeline. The map is
//! computed once per version, from the bitmap *before* any stage has mutated
//! it, and is read-only afterwards.

use crate::buffer::PixelBuffer;

/// Per-pixel edge strength in [0, 1]. 0 = flat region, 1 = strong edge.
/// Border pixels are always 0 (the 3x3 operator needs a full neighborhood).
#[derive(Debug, Clone)]
pub struct EdgeMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl EdgeMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

const SOBEL_X: [[f32; 3]; 3] = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: [[f32; 3]; 3] = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Compute the Sobel gradient magnitude map of a bitmap.
///
/// The gradient is taken over a grayscale projection (unweighted channel
/// average). Magnitude is `sqrt(gx^2 + gy^2) / 255`, clamped to [0, 1].
/// Deterministic: a pure function of the pixel content.
pub fn detect_edges(buffer: &PixelBuffer) -> EdgeMap {
    let width = buffer.width();
    let height = buffer.height();
    let mut values = vec![0.0f32; width as usize * height as usize];

    if width < 3 || height < 3 {
        return EdgeMap {
            width,
            height,
            values,
        };
    }

    let data = buffer.data();
    let gray = |x: u32, y: u32| -> f32 {
        let off = buffer.offset(x, y);
        (data[off] as f32 + data[off + 1] as f32 + data[off + 2] as f32) / 3.0
    };

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut gx = 0.0f32;
            let mut gy = 0.0f32;
            for ky in 0..3 {
                for kx in 0..3 {
                    let v = gray(x + kx - 1, y + ky - 1);
                    gx += v * SOBEL_X[ky as usize][kx as usize];
                    gy += v * SOBEL_Y[ky as usize][kx as usize];
                }
            }
            let magnitude = (gx * gx + gy * gy).sqrt() / 255.0;
            values[y as usize * width as usize + x as usize] = magnitude.clamp(0.0, 1.0);
        }
    }

    EdgeMap {
        width,
        height,
        values,
    }
}
