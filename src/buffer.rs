//! Owned RGBA pixel buffer and its resampling primitives.
//!
//! [`PixelBuffer`] is the unit of ownership in the pipeline: decode produces
//! one, preprocessing mutates it in place, and the encoder consumes it
//! read-only. Buffers are never shared between concurrent versions — each
//! version works on its own copy.
//!
//! Resampling delegates to the `image` crate (Lanczos3), the same path the
//! resize and thumbnail operations use everywhere else in this crate.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("zero-dimension bitmap ({width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("buffer length {len} does not match {width}x{height}x4")]
    LengthMismatch {
        width: u32,
        height: u32,
        len: usize,
    },
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("crop region {x},{y} {width}x{height} exceeds source bounds")]
    CropOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// A decoded bitmap: RGBA8, row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA samples. Dimensions must be non-zero and the buffer
    /// length must match exactly.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode an encoded image (JPEG, PNG, WebP) into an RGBA buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, BufferError> {
        let img = image::load_from_memory(bytes).map_err(|e| BufferError::Decode(e.to_string()))?;
        Self::from_rgba(img.to_rgba8())
    }

    /// Take ownership of a decoded `RgbaImage`.
    pub fn from_rgba(img: RgbaImage) -> Result<Self, BufferError> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of the raw RGBA representation in bytes. Compression ratios in
    /// version metadata are computed against this.
    pub fn raw_size(&self) -> usize {
        self.data.len()
    }

    /// Byte offset of the pixel at (x, y).
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// View as an `image` crate buffer for resampling. The clone is the
    /// ownership-transfer boundary into the `image` crate.
    fn to_rgba(&self) -> RgbaImage {
        // Invariant upheld by the constructor, so from_raw cannot fail.
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("buffer length invariant")
    }

    /// Resample to exact dimensions with Lanczos3.
    pub fn resize(&self, width: u32, height: u32) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        let resized = imageops::resize(&self.to_rgba(), width, height, FilterType::Lanczos3);
        Self::from_rgba(resized)
    }

    /// Extract a sub-rectangle.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::InvalidDimensions { width, height });
        }
        if x + width > self.width || y + height > self.height {
            return Err(BufferError::CropOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        let cropped = imageops::crop_imm(&self.to_rgba(), x, y, width, height).to_image();
        Self::from_rgba(cropped)
    }

    /// Uniformly scale both dimensions by `ratio`, clamping at 1x1.
    pub fn scaled(&self, ratio: f32) -> Result<Self, BufferError> {
        let width = ((self.width as f32 * ratio).round() as u32).max(1);
        let height = ((self.height as f32 * ratio).round() as u32).max(1);
        self.resize(width, height)
    }
}
