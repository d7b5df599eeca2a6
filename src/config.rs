//! Run configuration module.
//!
//! Handles loading, validating, and merging `imgpress.toml`. User files are
//! sparse: values merge on top of stock defaults, so a config only needs the
//! keys it wants to override. Unknown keys are rejected to catch typos
//! early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! quality_mode = "balanced"    # fast | balanced | aggressive
//!
//! [[presets]]
//! max_dimension = 1600         # longer edge in pixels
//! target_size = 245760         # byte budget (240 KiB)
//!
//! [[presets]]
//! max_dimension = 864
//! target_size = 147456
//! aspect_ratio = [4, 3]        # optional forced aspect
//!
//! [pipeline]
//! chroma_strength = 0.75       # 2x2 chroma averaging blend (0-1)
//! blur_sigma = 0.8             # Gaussian sigma for flat-region blur
//! blur_edge_threshold = 0.22   # below this edge strength pixels blur
//! quant_levels = 220           # color quantization levels (2-256)
//! sharpen_edge_threshold = 0.12
//! sharpen_strength = 0.45
//! sharpen_scale_threshold = 0.6
//!
//! [processing]
//! max_workers = 4              # Max parallel images (omit for auto = CPU cores)
//! ```

use crate::controller::QualityMode;
use crate::preprocess::PipelineOptions;
use crate::versions::Preset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Compression run configuration loaded from `imgpress.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    /// Search effort: fast | balanced | aggressive.
    pub quality_mode: QualityMode,
    /// Output versions to produce per source image.
    pub presets: Vec<PresetConfig>,
    /// Preprocessing stage tuning.
    pub pipeline: PipelineConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            quality_mode: QualityMode::Balanced,
            presets: vec![
                PresetConfig {
                    max_dimension: 1600,
                    target_size: 245_760,
                    aspect_ratio: None,
                },
                PresetConfig {
                    max_dimension: 864,
                    target_size: 147_456,
                    aspect_ratio: None,
                },
                PresetConfig {
                    max_dimension: 320,
                    target_size: 32_768,
                    aspect_ratio: None,
                },
            ],
            pipeline: PipelineConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl CompressConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.presets.is_empty() {
            return Err(ConfigError::Validation("presets must not be empty".into()));
        }
        for preset in &self.presets {
            if preset.max_dimension == 0 {
                return Err(ConfigError::Validation(
                    "presets.max_dimension must be non-zero".into(),
                ));
            }
            if preset.target_size == 0 {
                return Err(ConfigError::Validation(
                    "presets.target_size must be non-zero".into(),
                ));
            }
            if let Some([aw, ah]) = preset.aspect_ratio {
                if aw == 0 || ah == 0 {
                    return Err(ConfigError::Validation(
                        "presets.aspect_ratio values must be non-zero".into(),
                    ));
                }
            }
        }
        let p = &self.pipeline;
        if !(0.0..=1.0).contains(&p.chroma_strength) {
            return Err(ConfigError::Validation(
                "pipeline.chroma_strength must be 0-1".into(),
            ));
        }
        if p.blur_sigma < 0.1 {
            return Err(ConfigError::Validation(
                "pipeline.blur_sigma must be at least 0.1".into(),
            ));
        }
        if !(2..=256).contains(&p.quant_levels) {
            return Err(ConfigError::Validation(
                "pipeline.quant_levels must be 2-256".into(),
            ));
        }
        Ok(())
    }

    pub fn presets(&self) -> Vec<Preset> {
        self.presets.iter().map(PresetConfig::to_preset).collect()
    }
}

/// One output version in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    /// Longer edge of the output in pixels.
    pub max_dimension: u32,
    /// Byte budget for the encoded output.
    pub target_size: usize,
    /// Optional forced aspect ratio as `[width, height]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<[u32; 2]>,
}

impl PresetConfig {
    pub fn to_preset(&self) -> Preset {
        Preset {
            max_dimension: self.max_dimension,
            target_size: self.target_size,
            aspect_ratio: self.aspect_ratio.map(|[w, h]| (w, h)),
        }
    }
}

/// Preprocessing stage tuning, mirroring
/// [`PipelineOptions`](crate::preprocess::PipelineOptions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub chroma_strength: f32,
    pub blur_sigma: f32,
    pub blur_edge_threshold: f32,
    pub quant_levels: u32,
    pub sharpen_edge_threshold: f32,
    pub sharpen_strength: f32,
    pub sharpen_scale_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let opts = PipelineOptions::default();
        Self {
            chroma_strength: opts.chroma_strength,
            blur_sigma: opts.blur_sigma,
            blur_edge_threshold: opts.blur_edge_threshold,
            quant_levels: opts.quant_levels,
            sharpen_edge_threshold: opts.sharpen_edge_threshold,
            sharpen_strength: opts.sharpen_strength,
            sharpen_scale_threshold: opts.sharpen_scale_threshold,
        }
    }
}

impl PipelineConfig {
    pub fn to_options(&self) -> PipelineOptions {
        PipelineOptions {
            chroma_strength: self.chroma_strength,
            blur_sigma: self.blur_sigma,
            blur_edge_threshold: self.blur_edge_threshold,
            quant_levels: self.quant_levels,
            sharpen_edge_threshold: self.sharpen_edge_threshold,
            sharpen_strength: self.sharpen_strength,
            sharpen_scale_threshold: self.sharpen_scale_threshold,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of source images compressed concurrently.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CompressConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load config from a TOML file, merged on top of stock defaults.
///
/// A missing file yields the stock defaults. The merged result is
/// deserialized with unknown keys rejected, then validated.
pub fn load_config(path: &Path) -> Result<CompressConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = if path.exists() {
        let content = fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;
        merge_toml(base, overlay)
    } else {
        base
    };
    let config: CompressConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `imgpress.toml` with all keys and
/// explanations. Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpress Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Search effort per version: fast | balanced | aggressive
#   fast       - few quality probes, generous overshoot tolerance
#   balanced   - the default trade-off
#   aggressive - wide downward search, strict tolerance (slowest)
quality_mode = "balanced"

# Output versions to produce per source image. Each preset gives the longest
# edge in pixels and a byte budget for the encoded result. An optional
# aspect_ratio = [w, h] forces that ratio via a center crop.
[[presets]]
max_dimension = 1600
target_size = 245760

[[presets]]
max_dimension = 864
target_size = 147456

[[presets]]
max_dimension = 320
target_size = 32768

# Preprocessing tuning. The defaults are calibrated for photographic input;
# raise blur_edge_threshold or lower chroma_strength for screenshots.
[pipeline]
chroma_strength = 0.75
blur_sigma = 0.8
blur_edge_threshold = 0.22
quant_levels = 220
sharpen_edge_threshold = 0.12
sharpen_strength = 0.45
sharpen_scale_threshold = 0.6

[processing]
# Maximum number of source images compressed concurrently.
# Omit for auto (number of CPU cores). Clamped to the core count.
# max_workers = 4
"##
}
