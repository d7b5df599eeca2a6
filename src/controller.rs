//! Size-targeting compression control.
//!
//! Drives the external [`Encoder`] through a bounded binary search over its
//! quality parameter to land under a byte target, and falls back to a fixed
//! descending scale ladder when no quality at the current resolution can
//! get there. The encoder is assumed to produce monotonically
//! non-increasing sizes as quality decreases; the search tolerates small
//! violations and its iteration budget is a hard cap either way.

use crate::analyze::AnalysisReport;
use crate::buffer::{BufferError, PixelBuffer};
use crate::encoder::{Encoder, EncoderError, OutputFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest quality the search will ever request.
pub const QUALITY_FLOOR: f32 = 0.10;
/// Highest quality the search will ever request.
pub const QUALITY_CEILING: f32 = 0.95;
/// The search stops once the quality bracket narrows below this.
const QUALITY_EPSILON: f32 = 0.003;

/// A controller result larger than `target * SIZE_SLACK` should be retried
/// through [`advanced_optimize`].
pub const SIZE_SLACK: f32 = 1.15;

/// Descending downscale ratios tried by the multi-scale fallback.
const SCALE_LADDER: [f32; 9] = [0.94, 0.86, 0.78, 0.70, 0.62, 0.54, 0.46, 0.40, 0.35];
/// Last-resort scale for the one unconditional terminal encode.
const TERMINAL_SCALE: f32 = 0.32;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// How hard the search works for a byte target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    /// Few probes, generous tolerance. For previews and bulk runs.
    Fast,
    #[default]
    Balanced,
    /// Wide downward range, strict tolerance. Used by the fallback ladder.
    Aggressive,
}

/// Search tuning for one quality mode: how far below/above the analyzer's
/// recommendation the bracket extends, the acceptable overshoot, and the
/// encode budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityAdjustmentProfile {
    pub range: f32,
    pub boost: f32,
    pub tolerance: f32,
    pub iterations: u32,
}

impl QualityMode {
    pub fn profile(self) -> QualityAdjustmentProfile {
        match self {
            QualityMode::Fast => QualityAdjustmentProfile {
                range: 0.15,
                boost: 0.05,
                tolerance: 1.05,
                iterations: 5,
            },
            QualityMode::Balanced => QualityAdjustmentProfile {
                range: 0.25,
                boost: 0.10,
                tolerance: 1.02,
                iterations: 8,
            },
            QualityMode::Aggressive => QualityAdjustmentProfile {
                range: 0.45,
                boost: 0.02,
                tolerance: 0.98,
                iterations: 12,
            },
        }
    }
}

/// Result of a quality search at a fixed resolution.
#[derive(Debug)]
pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    /// Quality of the returned encode.
    pub quality: f32,
    /// Encoder calls spent.
    pub iterations: u32,
    /// Whether the result landed within the profile's tolerance. False only
    /// for the best-effort floor encode.
    pub met_tolerance: bool,
}

/// Result of the multi-scale fallback.
#[derive(Debug)]
pub struct ScaledOutcome {
    pub bytes: Vec<u8>,
    pub quality: f32,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
    /// False when even the terminal encode exceeded the target. Surfaced in
    /// version metadata, never raised as an error.
    pub target_met: bool,
}

/// Binary-search the encoder's quality parameter for the largest quality
/// whose output fits `target_size * tolerance`.
///
/// A feasible probe becomes the running candidate and raises the search
/// floor — among feasible qualities the highest always wins, which is why a
/// success does not terminate the loop. If no probe is feasible within the
/// iteration budget, the bitmap is encoded once at the final floor as a
/// best effort.
pub fn compress_to_target(
    buffer: &PixelBuffer,
    format: OutputFormat,
    target_size: usize,
    analysis: &AnalysisReport,
    mode: QualityMode,
    encoder: &impl Encoder,
) -> Result<CompressionOutcome, EncoderError> {
    let profile = mode.profile();
    let base = analysis.recommended_quality;
    let mut min_q = (base - profile.range).max(QUALITY_FLOOR);
    let mut max_q = (base + profile.boost).min(QUALITY_CEILING);
    let bound = target_size as f32 * profile.tolerance;

    let mut best: Option<(Vec<u8>, f32)> = None;
    let mut iterations = 0u32;

    while iterations < profile.iterations && (max_q - min_q) > QUALITY_EPSILON {
        let quality = (min_q + max_q) / 2.0;
        let bytes = encoder.encode(buffer, format, quality)?;
        iterations += 1;
        if bytes.len() as f32 <= bound {
            best = Some((bytes, quality));
            min_q = quality;
        } else {
            max_q = quality;
        }
    }

    match best {
        Some((bytes, quality)) => Ok(CompressionOutcome {
            bytes,
            quality,
            iterations,
            met_tolerance: true,
        }),
        None => {
            let bytes = encoder.encode(buffer, format, min_q)?;
            Ok(CompressionOutcome {
                bytes,
                quality: min_q,
                iterations: iterations + 1,
                met_tolerance: false,
            })
        }
    }
}

/// Multi-scale fallback for targets unreachable at the current resolution.
///
/// Walks [`SCALE_LADDER`] top-down, rescaling the bitmap and rerunning the
/// quality search at the aggressive profile, returning the first result at
/// or under `target_size`. When every rung fails, one terminal encode at
/// [`TERMINAL_SCALE`] and the quality floor is returned unconditionally —
/// it may exceed the target, and says so via `target_met`.
pub fn advanced_optimize(
    buffer: &PixelBuffer,
    format: OutputFormat,
    target_size: usize,
    analysis: &AnalysisReport,
    encoder: &impl Encoder,
) -> Result<ScaledOutcome, CompressionError> {
    for &scale in &SCALE_LADDER {
        let scaled = buffer.scaled(scale)?;
        let outcome = compress_to_target(
            &scaled,
            format,
            target_size,
            analysis,
            QualityMode::Aggressive,
            encoder,
        )?;
        if outcome.bytes.len() <= target_size {
            return Ok(ScaledOutcome {
                width: scaled.width(),
                height: scaled.height(),
                bytes: outcome.bytes,
                quality: outcome.quality,
                scale,
                target_met: true,
            });
        }
    }

    let scaled = buffer.scaled(TERMINAL_SCALE)?;
    let bytes = encoder.encode(&scaled, format, QUALITY_FLOOR)?;
    let target_met = bytes.len() <= target_size;
    Ok(ScaledOutcome {
        width: scaled.width(),
        height: scaled.height(),
        bytes,
        quality: QUALITY_FLOOR,
        scale: TERMINAL_SCALE,
        target_met,
    })
}
