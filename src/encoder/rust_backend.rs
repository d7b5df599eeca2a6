//! Pure Rust encoder built on the `image` crate codecs.
//!
//! ## Crate mapping
//!
//! | Format | Crate / encoder |
//! |---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1-100) |
//! | PNG | `image::codecs::png::PngEncoder` (Best + Adaptive filtering) |
//! | WebP | unsupported — the `image` crate ships a lossless-only WebP
//! encoder with no quality knob, which cannot participate in the quality
//! search. The capability probe reports it honestly and the analyzer falls
//! back to JPEG. |

use super::backend::{Encoder, EncoderError, OutputFormat};
use crate::buffer::PixelBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use std::io::Cursor;

/// Production encoder. Stateless; one instance serves all versions.
pub struct RustEncoder;

impl RustEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the [0, 1] search quality onto the codec's 1-100 scale.
fn quality_u8(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Drop the alpha channel for formats without one.
fn to_rgb(buffer: &PixelBuffer) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(buffer.pixel_count() * 3);
    for px in buffer.data().chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

impl Encoder for RustEncoder {
    fn encode(
        &self,
        buffer: &PixelBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, EncoderError> {
        let mut out = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                let rgb = to_rgb(buffer);
                let encoder =
                    JpegEncoder::new_with_quality(Cursor::new(&mut out), quality_u8(quality));
                encoder
                    .write_image(
                        &rgb,
                        buffer.width(),
                        buffer.height(),
                        ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| EncoderError::EncodingFailed(format!("JPEG encode: {e}")))?;
            }
            OutputFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    Cursor::new(&mut out),
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                encoder
                    .write_image(
                        buffer.data(),
                        buffer.width(),
                        buffer.height(),
                        ExtendedColorType::Rgba8,
                    )
                    .map_err(|e| EncoderError::EncodingFailed(format!("PNG encode: {e}")))?;
            }
            OutputFormat::WebP => {
                return Err(EncoderError::UnsupportedFormat(OutputFormat::WebP));
            }
        }
        Ok(out)
    }

    fn format_supported(&self, format: OutputFormat) -> bool {
        matches!(format, OutputFormat::Jpeg | OutputFormat::Png)
    }
}
