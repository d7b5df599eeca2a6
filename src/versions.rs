//! Version orchestration.
//!
//! Turns one analyzed source bitmap into N encoded versions, one per
//! [`Preset`]: dimension calculation, center smart-crop, preprocessing,
//! size-targeted compression, and the multi-scale fallback when the result
//! overshoots the byte budget by more than [`SIZE_SLACK`].
//!
//! Versions are independent — each works on its own bitmap copy — and run
//! in parallel on the rayon pool. A failed preset is reported as an event
//! and skipped; the batch never aborts because one version failed.
//!
//! All cross-cutting state (progress events, cooperative cancellation,
//! cumulative statistics) lives in an explicit [`BatchContext`] owned by the
//! caller. There is no module-level state.

use crate::analyze::AnalysisReport;
use crate::buffer::PixelBuffer;
use crate::calculations::{crop_origin, fill_dimensions, version_dimensions};
use crate::controller::{
    advanced_optimize, compress_to_target, CompressionError, QualityMode, SIZE_SLACK,
};
use crate::edges::detect_edges;
use crate::encoder::{Encoder, OutputFormat};
use crate::preprocess::{preprocess, PipelineOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::time::Instant;

/// One output specification: longest edge, byte budget, optional forced
/// aspect ratio. Immutable once handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub max_dimension: u32,
    pub target_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<(u32, u32)>,
}

/// Per-image knobs for the orchestrator.
#[derive(Debug, Clone)]
pub struct VersionOptions {
    pub quality_mode: QualityMode,
    pub pipeline: PipelineOptions,
    /// Display label carried into progress events (usually the file name).
    pub label: String,
}

impl Default for VersionOptions {
    fn default() -> Self {
        Self {
            quality_mode: QualityMode::Balanced,
            pipeline: PipelineOptions::default(),
            label: "image".to_string(),
        }
    }
}

/// One encoded version plus its metadata. `bytes` is the deliverable; the
/// rest is bookkeeping for callers and progress output.
#[derive(Debug, Serialize)]
pub struct VersionResult {
    pub preset: Preset,
    #[serde(skip_serializing)]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Achieved encoded size in bytes.
    pub size: usize,
    pub format: OutputFormat,
    pub quality: f32,
    /// Raw RGBA size of the final dimensions divided by the encoded size.
    pub compression_ratio: f32,
    pub elapsed_ms: u64,
    /// False when even the terminal fallback exceeded the byte budget.
    /// This is a warning surfaced in metadata, not an error.
    pub target_met: bool,
    pub used_fallback: bool,
}

/// Progress notifications, one per finished or failed version. Emitted
/// through the channel on [`BatchContext`]; purely observational.
#[derive(Debug, Clone)]
pub enum CompressEvent {
    ImageStarted {
        label: String,
        preset_count: usize,
    },
    VersionCompleted {
        label: String,
        width: u32,
        height: u32,
        size: usize,
        target_size: usize,
        target_met: bool,
        used_fallback: bool,
    },
    VersionFailed {
        label: String,
        max_dimension: u32,
        error: String,
    },
}

/// Cumulative batch counters. Plain atomics — shared read-mostly across the
/// rayon pool, snapshotted at the end.
#[derive(Debug, Default)]
pub struct BatchStats {
    pub images: AtomicUsize,
    pub versions: AtomicUsize,
    pub failures: AtomicUsize,
    pub bytes_in: AtomicU64,
    pub bytes_out: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchStatsSnapshot {
    pub images: usize,
    pub versions: usize,
    pub failures: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl fmt::Display for BatchStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images, {} versions ({} failed), {} bytes in, {} bytes out",
            self.images, self.versions, self.failures, self.bytes_in, self.bytes_out
        )
    }
}

/// Explicit context for one batch run: event sink, cooperative cancellation
/// flag, and cumulative statistics. Passed by reference into every call —
/// the library keeps no global state.
#[derive(Default)]
pub struct BatchContext {
    events: Option<Sender<CompressEvent>>,
    cancelled: AtomicBool,
    pub stats: BatchStats,
}

impl BatchContext {
    pub fn new(events: Option<Sender<CompressEvent>>) -> Self {
        Self {
            events,
            cancelled: AtomicBool::new(false),
            stats: BatchStats::default(),
        }
    }

    /// Request cooperative cancellation. Checked at image granularity by
    /// batch drivers; an image already in flight runs to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn emit(&self, event: CompressEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver just means nobody is listening anymore.
            let _ = tx.send(event);
        }
    }

    pub fn record_image(&self, bytes_in: u64) {
        self.stats.images.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_in.fetch_add(bytes_in, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            images: self.stats.images.load(Ordering::Relaxed),
            versions: self.stats.versions.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            bytes_in: self.stats.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.stats.bytes_out.load(Ordering::Relaxed),
        }
    }
}

/// Resize-to-fill then center-crop, so the output matches the target
/// dimensions exactly without letterboxing.
pub fn smart_crop(
    source: &PixelBuffer,
    width: u32,
    height: u32,
) -> Result<PixelBuffer, crate::buffer::BufferError> {
    let fill = fill_dimensions((source.width(), source.height()), (width, height));
    let resized = source.resize(fill.0, fill.1)?;
    let (ox, oy) = crop_origin(fill, (width, height));
    resized.crop(ox, oy, width, height)
}

/// Produce one version per preset.
///
/// Presets run concurrently on the rayon pool, each on its own copy of the
/// source. Failures are emitted as [`CompressEvent::VersionFailed`] and
/// skipped, so the result holds between 0 and `presets.len()` entries, in
/// preset order.
pub fn produce_versions(
    source: &PixelBuffer,
    presets: &[Preset],
    analysis: &AnalysisReport,
    encoder: &impl Encoder,
    options: &VersionOptions,
    ctx: &BatchContext,
) -> Vec<VersionResult> {
    ctx.emit(CompressEvent::ImageStarted {
        label: options.label.clone(),
        preset_count: presets.len(),
    });

    presets
        .par_iter()
        .filter_map(|preset| match produce_version(source, preset, analysis, encoder, options) {
            Ok(result) => {
                ctx.stats.versions.fetch_add(1, Ordering::Relaxed);
                ctx.stats
                    .bytes_out
                    .fetch_add(result.size as u64, Ordering::Relaxed);
                ctx.emit(CompressEvent::VersionCompleted {
                    label: options.label.clone(),
                    width: result.width,
                    height: result.height,
                    size: result.size,
                    target_size: preset.target_size,
                    target_met: result.target_met,
                    used_fallback: result.used_fallback,
                });
                Some(result)
            }
            Err(e) => {
                ctx.stats.failures.fetch_add(1, Ordering::Relaxed);
                ctx.emit(CompressEvent::VersionFailed {
                    label: options.label.clone(),
                    max_dimension: preset.max_dimension,
                    error: e.to_string(),
                });
                None
            }
        })
        .collect()
}

/// The per-preset pipeline: dimensions → smart-crop → edge map →
/// preprocessing → quality search → fallback if the budget is blown.
fn produce_version(
    source: &PixelBuffer,
    preset: &Preset,
    analysis: &AnalysisReport,
    encoder: &impl Encoder,
    options: &VersionOptions,
) -> Result<VersionResult, CompressionError> {
    let start = Instant::now();

    let (width, height) = version_dimensions(
        (source.width(), source.height()),
        preset.max_dimension,
        preset.aspect_ratio,
    );
    let mut bitmap = smart_crop(source, width, height)?;

    let scale =
        width.max(height) as f32 / source.width().max(source.height()) as f32;
    // Edge map comes from the bitmap before any stage mutates it, and is
    // shared read-only by the blur and sharpen stages.
    let edges = detect_edges(&bitmap);
    preprocess(&mut bitmap, &edges, analysis, scale, &options.pipeline);

    let format = analysis.suggested_format;
    let outcome = compress_to_target(
        &bitmap,
        format,
        preset.target_size,
        analysis,
        options.quality_mode,
        encoder,
    )?;

    let slack_bound = preset.target_size as f32 * SIZE_SLACK;
    let (bytes, quality, out_w, out_h, target_met, used_fallback) =
        if outcome.bytes.len() as f32 > slack_bound {
            let scaled =
                advanced_optimize(&bitmap, format, preset.target_size, analysis, encoder)?;
            (
                scaled.bytes,
                scaled.quality,
                scaled.width,
                scaled.height,
                scaled.target_met,
                true,
            )
        } else {
            (outcome.bytes, outcome.quality, width, height, true, false)
        };

    let raw_size = out_w as f32 * out_h as f32 * 4.0;
    let size = bytes.len();
    Ok(VersionResult {
        preset: preset.clone(),
        bytes,
        width: out_w,
        height: out_h,
        size,
        format,
        quality,
        compression_ratio: raw_size / size.max(1) as f32,
        elapsed_ms: start.elapsed().as_millis() as u64,
        target_met,
        used_fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::ImageType;
    use crate::encoder::backend::tests::MockEncoder;
    use crate::encoder::EncoderError;
    use std::sync::mpsc;

    fn photo_report() -> AnalysisReport {
        AnalysisReport {
            complexity: 12.0,
            unique_colors: 9000,
            image_type: ImageType::Photo,
            has_transparency: false,
            transparency_ratio: 0.0,
            avg_brightness: 120.0,
            avg_saturation: 35.0,
            avg_variation: 14.0,
            recommended_quality: 0.68,
            suggested_format: OutputFormat::Jpeg,
            compressibility: 60,
            is_low_detail: false,
            is_dark: false,
            is_vibrant: false,
        }
    }

    fn solid(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new(width, height, vec![120; width as usize * height as usize * 4]).unwrap()
    }

    // =========================================================================
    // smart_crop
    // =========================================================================

    #[test]
    fn smart_crop_exact_aspect_from_wider_source() {
        let out = smart_crop(&solid(800, 600), 400, 400).unwrap();
        assert_eq!((out.width(), out.height()), (400, 400));
    }

    #[test]
    fn smart_crop_exact_aspect_from_taller_source() {
        let out = smart_crop(&solid(600, 800), 400, 400).unwrap();
        assert_eq!((out.width(), out.height()), (400, 400));
    }

    #[test]
    fn smart_crop_landscape_target_from_portrait_source() {
        let out = smart_crop(&solid(600, 800), 320, 180).unwrap();
        assert_eq!((out.width(), out.height()), (320, 180));
    }

    // =========================================================================
    // produce_versions
    // =========================================================================

    #[test]
    fn one_result_per_preset_in_order() {
        let presets = vec![
            Preset {
                max_dimension: 200,
                target_size: 60_000,
                aspect_ratio: None,
            },
            Preset {
                max_dimension: 100,
                target_size: 20_000,
                aspect_ratio: None,
            },
            Preset {
                max_dimension: 50,
                target_size: 8_000,
                aspect_ratio: Some((1, 1)),
            },
        ];
        let encoder = MockEncoder::new();
        let ctx = BatchContext::new(None);
        let results = produce_versions(
            &solid(400, 300),
            &presets,
            &photo_report(),
            &encoder,
            &VersionOptions::default(),
            &ctx,
        );

        assert_eq!(results.len(), 3);
        assert_eq!((results[0].width, results[0].height), (200, 150));
        assert_eq!((results[1].width, results[1].height), (100, 75));
        assert_eq!((results[2].width, results[2].height), (50, 50));
        assert!(results.iter().all(|r| r.target_met));
        assert!(results.iter().all(|r| !r.used_fallback));
        assert_eq!(ctx.snapshot().versions, 3);
        assert_eq!(ctx.snapshot().failures, 0);
    }

    #[test]
    fn forced_aspect_ratio_is_exact() {
        let presets = vec![Preset {
            max_dimension: 300,
            target_size: 50_000,
            aspect_ratio: Some((4, 3)),
        }];
        let encoder = MockEncoder::new();
        let ctx = BatchContext::new(None);
        let results = produce_versions(
            &solid(1000, 400),
            &presets,
            &photo_report(),
            &encoder,
            &VersionOptions::default(),
            &ctx,
        );
        assert_eq!(results.len(), 1);
        assert_eq!((results[0].width, results[0].height), (300, 225));
    }

    #[test]
    fn overshoot_engages_fallback() {
        // Encoder floor far above target: full-res search overshoots the
        // slack bound, the ladder fails too, the terminal encode returns.
        let encoder = MockEncoder::with_floor(50_000);
        let presets = vec![Preset {
            max_dimension: 100,
            target_size: 5_000,
            aspect_ratio: None,
        }];
        let ctx = BatchContext::new(None);
        let results = produce_versions(
            &solid(100, 100),
            &presets,
            &photo_report(),
            &encoder,
            &VersionOptions::default(),
            &ctx,
        );

        assert_eq!(results.len(), 1);
        assert!(results[0].used_fallback);
        assert!(!results[0].target_met);
        assert_eq!((results[0].width, results[0].height), (32, 32));
    }

    #[test]
    fn failing_preset_is_skipped_not_fatal() {
        // Errors only for bitmaps narrower than 60 px, so one preset of
        // the pair fails and the other succeeds.
        struct FlakyEncoder;
        impl Encoder for FlakyEncoder {
            fn encode(
                &self,
                buffer: &PixelBuffer,
                _format: OutputFormat,
                quality: f32,
            ) -> Result<Vec<u8>, EncoderError> {
                if buffer.width() < 60 {
                    return Err(EncoderError::EncodingFailed("canvas too small".into()));
                }
                let size = (buffer.pixel_count() as f32 * quality * 0.8) as usize + 200;
                Ok(vec![0u8; size])
            }
            fn format_supported(&self, format: OutputFormat) -> bool {
                format != OutputFormat::WebP
            }
        }

        let presets = vec![
            Preset {
                max_dimension: 100,
                target_size: 60_000,
                aspect_ratio: None,
            },
            Preset {
                max_dimension: 50,
                target_size: 60_000,
                aspect_ratio: None,
            },
        ];
        let (tx, rx) = mpsc::channel();
        let ctx = BatchContext::new(Some(tx));
        let results = produce_versions(
            &solid(200, 200),
            &presets,
            &photo_report(),
            &FlakyEncoder,
            &VersionOptions::default(),
            &ctx,
        );

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].width, 100);
        assert_eq!(ctx.snapshot().failures, 1);

        let events: Vec<CompressEvent> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| matches!(e, CompressEvent::VersionFailed { max_dimension: 50, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, CompressEvent::VersionCompleted { width: 100, .. })));
    }

    #[test]
    fn events_arrive_one_per_version() {
        let presets = vec![
            Preset {
                max_dimension: 80,
                target_size: 30_000,
                aspect_ratio: None,
            },
            Preset {
                max_dimension: 40,
                target_size: 10_000,
                aspect_ratio: None,
            },
        ];
        let (tx, rx) = mpsc::channel();
        let ctx = BatchContext::new(Some(tx));
        let results = produce_versions(
            &solid(160, 160),
            &presets,
            &photo_report(),
            &MockEncoder::new(),
            &VersionOptions::default(),
            &ctx,
        );

        let events: Vec<CompressEvent> = rx.try_iter().collect();
        let completed = events
            .iter()
            .filter(|e| matches!(e, CompressEvent::VersionCompleted { .. }))
            .count();
        assert_eq!(completed, results.len());
        assert!(matches!(
            events[0],
            CompressEvent::ImageStarted { preset_count: 2, .. }
        ));
    }

    #[test]
    fn context_cancellation_is_sticky() {
        let ctx = BatchContext::new(None);
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn stats_snapshot_accumulates() {
        let ctx = BatchContext::new(None);
        ctx.record_image(1000);
        ctx.record_image(500);
        let snap = ctx.snapshot();
        assert_eq!(snap.images, 2);
        assert_eq!(snap.bytes_in, 1500);
        assert_eq!(
            snap.to_string(),
            "2 images, 0 versions (0 failed), 1500 bytes in, 0 bytes out"
        );
    }

    #[test]
    fn compression_ratio_reflects_raw_size() {
        let presets = vec![Preset {
            max_dimension: 100,
            target_size: 40_000,
            aspect_ratio: None,
        }];
        let ctx = BatchContext::new(None);
        let results = produce_versions(
            &solid(100, 100),
            &presets,
            &photo_report(),
            &MockEncoder::new(),
            &VersionOptions::default(),
            &ctx,
        );
        let r = &results[0];
        let expected = (r.width * r.height * 4) as f32 / r.size as f32;
        assert!((r.compression_ratio - expected).abs() < 1e-3);
    }
}
