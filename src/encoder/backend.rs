//! Encoder trait and shared types.
//!
//! The [`Encoder`] trait is the seam between the compression logic and the
//! actual bitstream encoders. The search in
//! [`controller`](crate::controller) treats it as a black box with one
//! documented contract: for a fixed bitmap and format, output size is
//! monotonically non-increasing as quality decreases. Real encoders bend
//! this occasionally; the search tolerates small violations and the tests
//! pin the behavior against a deterministic mock.

use crate::buffer::PixelBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("format {0} is not supported by this encoder")]
    UnsupportedFormat(OutputFormat),
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
}

/// Output formats the compression pipeline can target.
///
/// - `Png` — alpha-capable, lossless-friendly; suggested for graphics and
///   transparent images.
/// - `WebP` — modern lossy format, used only when the encoder's capability
///   probe reports support.
/// - `Jpeg` — baseline lossy fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        })
    }
}

/// Trait for bitstream encoders.
///
/// `Sync` so a single encoder instance can serve rayon-parallel versions.
pub trait Encoder: Sync {
    /// Encode the bitmap at `quality` in [0, 1].
    fn encode(
        &self,
        buffer: &PixelBuffer,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, EncoderError>;

    /// Capability probe: whether `format` can be produced in this
    /// environment. Consulted by the analyzer when suggesting a format.
    fn format_supported(&self, format: OutputFormat) -> bool;
}
