//! # imgpress
//!
//! Adaptive image compression: reduce a raster image to a byte budget while
//! preserving perceptual quality, producing several resized versions per
//! source image.
//!
//! # Architecture: Analyze → Preprocess → Search
//!
//! Every source image flows through three stages:
//!
//! ```text
//! 1. Analyze     bitmap   →  AnalysisReport   (classification + recommendations)
//! 2. Preprocess  bitmap   →  bitmap           (entropy reduction, in place)
//! 3. Compress    bitmap   →  encoded bytes    (quality search against a byte target)
//! ```
//!
//! The analysis runs once per source; stages 2 and 3 run once per output
//! version, orchestrated by [`versions::produce_versions`]. This separation
//! exists for three reasons:
//!
//! - **Cost**: analysis samples a bounded probe, so its price is independent
//!   of source resolution and of the number of versions.
//! - **Determinism**: each stage is a pure function of its inputs, so unit
//!   tests exercise classification and search logic without real codecs.
//! - **Testability**: the encoder sits behind a trait with a documented
//!   quality→size contract, replaceable by a deterministic stub.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`buffer`] | `PixelBuffer` — owned RGBA bitmap, decode/resize/crop primitives |
//! | [`analyze`] | probe sampling, classification, quality/format recommendation |
//! | [`edges`] | Sobel edge map consumed by blur and sharpen stages |
//! | [`preprocess`] | chroma subsampling, edge-aware blur, quantization, sharpening |
//! | [`controller`] | quality binary search + multi-scale fallback ladder |
//! | [`versions`] | per-preset orchestration, batch context, progress events |
//! | [`encoder`] | the `Encoder` trait and the `image`-crate production backend |
//! | [`calculations`] | pure dimension math (version sizing, fill, center crop) |
//! | [`config`] | `imgpress.toml` loading, validation, merging |
//! | [`output`] | CLI output formatting for events and summaries |
//!
//! # Design Decisions
//!
//! ## The Encoder Is a Black Box
//!
//! Real codec quality→size curves differ across platforms and versions. The
//! search in [`controller`] relies on exactly one assumption — size does not
//! increase as quality decreases — and is bounded by an iteration budget
//! either way. Everything above the [`encoder::Encoder`] trait is
//! deterministic and tested against a stub with an exact linear curve.
//!
//! ## Preprocessing Before Encoding
//!
//! Encoders spend bytes on entropy the eye barely sees: block-level chroma
//! variation, sensor noise in flat regions, thousands of near-identical
//! colors. The [`preprocess`] stages remove that entropy first, guided by a
//! Sobel edge map so real detail survives. The encoder then hits the byte
//! target at a visibly higher quality setting.
//!
//! ## No Global State
//!
//! Progress events, cancellation, and cumulative statistics live in an
//! explicit [`versions::BatchContext`] owned by the caller and passed by
//! reference. Two concurrent batch runs in one process cannot observe each
//! other.
//!
//! ## Pure-Rust Codecs
//!
//! The production encoder uses the `image` crate (JPEG, PNG) — no system
//! libraries, a single self-contained binary. WebP output is deliberately
//! not offered: the available encoder is lossless-only, which has no quality
//! knob for the search to drive, so the capability probe reports it
//! unsupported and format suggestion falls back to JPEG.

pub mod analyze;
pub mod buffer;
pub mod calculations;
pub mod config;
pub mod controller;
pub mod edges;
pub mod encoder;
pub mod output;
pub mod preprocess;
pub mod versions;

pub use analyze::{analyze, AnalysisReport, ImageType};
pub use buffer::{BufferError, PixelBuffer};
pub use controller::{advanced_optimize, compress_to_target, QualityMode};
pub use encoder::{Encoder, EncoderError, OutputFormat, RustEncoder};
pub use versions::{produce_versions, BatchContext, CompressEvent, Preset, VersionResult};
