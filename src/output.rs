//! CLI output formatting.
//!
//! Pure `format_*` functions return display lines so they can be unit
//! tested; thin `print_*` wrappers write them to stdout. Information-first:
//! each image leads with its label, versions are indented context beneath
//! it.

use crate::analyze::AnalysisReport;
use crate::versions::{BatchStatsSnapshot, CompressEvent};

/// Human-readable byte count (B / KiB / MiB, one decimal above bytes).
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Format a single progress event as display lines.
pub fn format_compress_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::ImageStarted {
            label,
            preset_count,
        } => {
            vec![format!("{} ({} versions)", label, preset_count)]
        }
        CompressEvent::VersionCompleted {
            width,
            height,
            size,
            target_size,
            target_met,
            used_fallback,
            ..
        } => {
            let mut line = format!(
                "    {}x{} \u{2192} {} (target {})",
                width,
                height,
                format_bytes(*size as u64),
                format_bytes(*target_size as u64)
            );
            if *used_fallback {
                line.push_str(" [rescaled]");
            }
            if !*target_met {
                line.push_str(" [over budget]");
            }
            vec![line]
        }
        CompressEvent::VersionFailed {
            max_dimension,
            error,
            ..
        } => {
            vec![format!("    {}px failed: {}", max_dimension, error)]
        }
    }
}

/// Format an analysis report as a short human-readable block.
pub fn format_analysis(label: &str, report: &AnalysisReport) -> Vec<String> {
    let mut lines = vec![label.to_string()];
    lines.push(format!(
        "    type: {:?}, complexity {:.1}, {} unique colors",
        report.image_type, report.complexity, report.unique_colors
    ));
    lines.push(format!(
        "    recommended quality {:.2}, format {}, compressibility {}",
        report.recommended_quality, report.suggested_format, report.compressibility
    ));
    if report.has_transparency {
        lines.push(format!(
            "    transparency: {:.0}% of probe",
            report.transparency_ratio * 100.0
        ));
    }
    lines
}

/// Format the end-of-run summary line.
pub fn format_batch_summary(stats: &BatchStatsSnapshot) -> String {
    format!(
        "{} images, {} versions ({} failed), {} \u{2192} {}",
        stats.images,
        stats.versions,
        stats.failures,
        format_bytes(stats.bytes_in),
        format_bytes(stats.bytes_out)
    )
}

/// Print a progress event to stdout.
pub fn print_compress_event(event: &CompressEvent) {
    for line in format_compress_event(event) {
        println!("{}", line);
    }
}

/// Print an analysis block to stdout.
pub fn print_analysis(label: &str, report: &AnalysisReport) {
    for line in format_analysis(label, report) {
        println!("{}", line);
    }
}
