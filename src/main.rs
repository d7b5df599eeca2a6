use clap::{Parser, Subcommand};
use imgpress::versions::VersionOptions;
use imgpress::{analyze, config, output, produce_versions, BatchContext, PixelBuffer, RustEncoder};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "imgpress")]
#[command(about = "Compress images to a byte budget, producing resized versions")]
#[command(long_about = "\
Compress images to a byte budget, producing resized versions

Each source image is analyzed once (classification, recommended quality,
suggested format), preprocessed to strip entropy the encoder would waste
bytes on, then encoded through a binary search over the quality parameter
until the configured byte target is met. Targets unreachable at full
resolution fall back to a descending scale ladder.

Versions are driven by presets in imgpress.toml:

  [[presets]]
  max_dimension = 864        # longer edge in pixels
  target_size = 147456       # byte budget
  aspect_ratio = [4, 3]      # optional center-crop ratio

Run 'imgpress gen-config' to generate a documented imgpress.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "imgpress.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze images and print their content reports
    Analyze {
        /// Image files or directories
        inputs: Vec<PathBuf>,
        /// Print full reports as JSON instead of summaries
        #[arg(long)]
        json: bool,
    },
    /// Compress images against the configured presets
    Compress {
        /// Image files or directories
        inputs: Vec<PathBuf>,
        /// Output directory
        #[arg(long, default_value = "compressed")]
        output: PathBuf,
        /// Override the configured quality mode (fast | balanced | aggressive)
        #[arg(long)]
        quality_mode: Option<String>,
    },
    /// Print a stock imgpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Analyze { inputs, json } => {
            let encoder = RustEncoder::new();
            for path in collect_inputs(&inputs) {
                let bytes = std::fs::read(&path)?;
                let bitmap = PixelBuffer::decode(&bytes)?;
                let report = analyze(&bitmap, &encoder);
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    output::print_analysis(&path.display().to_string(), &report);
                }
            }
        }
        Command::Compress {
            inputs,
            output: output_dir,
            quality_mode,
        } => {
            let mut cfg = config::load_config(&cli.config)?;
            if let Some(mode) = quality_mode {
                cfg.quality_mode = parse_quality_mode(&mode)?;
            }
            init_thread_pool(&cfg.processing);
            std::fs::create_dir_all(&output_dir)?;

            let files = collect_inputs(&inputs);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_compress_event(&event);
                }
            });

            let ctx = BatchContext::new(Some(tx));
            files.par_iter().for_each(|path| {
                // Cooperative cancellation point: checked per image, never
                // mid-pipeline.
                if ctx.is_cancelled() {
                    return;
                }
                if let Err(e) = compress_file(path, &output_dir, &cfg, &ctx) {
                    eprintln!("{}: {}", path.display(), e);
                }
            });

            let summary = output::format_batch_summary(&ctx.snapshot());
            drop(ctx);
            printer.join().unwrap();
            println!("{}", summary);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Compress one source file into every configured preset version.
fn compress_file(
    path: &Path,
    output_dir: &Path,
    cfg: &config::CompressConfig,
    ctx: &BatchContext,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_bytes = std::fs::read(path)?;
    ctx.record_image(file_bytes.len() as u64);

    let bitmap = PixelBuffer::decode(&file_bytes)?;
    let encoder = RustEncoder::new();
    let report = analyze(&bitmap, &encoder);

    let label = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let options = VersionOptions {
        quality_mode: cfg.quality_mode,
        pipeline: cfg.pipeline.to_options(),
        label,
    };

    let results = produce_versions(&bitmap, &cfg.presets(), &report, &encoder, &options, ctx);

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    for result in results {
        let name = format!(
            "{}-{}.{}",
            stem,
            result.preset.max_dimension,
            result.format.extension()
        );
        std::fs::write(output_dir.join(name), &result.bytes)?;
    }
    Ok(())
}

/// Expand directories into their contained image files, keep plain files
/// as-is, and sort for a stable processing order.
fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let keep = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()));
                if keep {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    files
}

fn parse_quality_mode(s: &str) -> Result<imgpress::QualityMode, String> {
    match s {
        "fast" => Ok(imgpress::QualityMode::Fast),
        "balanced" => Ok(imgpress::QualityMode::Balanced),
        "aggressive" => Ok(imgpress::QualityMode::Aggressive),
        other => Err(format!(
            "unknown quality mode '{other}' (expected fast, balanced, or aggressive)"
        )),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down,
/// not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let workers = config::effective_workers(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .ok();
}
