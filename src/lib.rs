//! # imgshrink Library
//!
//! Batch downscaler that walks an input tree, shrinks every JPEG/PNG/DNG image
//! by a scale factor and re-encodes it as JPEG into a mirrored output tree.
//!
//! The [`BatchTransformer`] does the walking on the calling thread; the
//! [`Runner`] moves one run onto a background thread and hands back a
//! [`RunHandle`] whose channel carries [`RunEvent`]s to the display layer.

pub mod config;
pub mod converter;
pub mod core;
pub mod progress;
pub mod stats;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use crate::config::{Config, JobParameters, ParameterError, ProfileConfig};
pub use crate::converter::{EncodedImage, ImageConverter};
pub use crate::core::BatchTransformer;
pub use crate::progress::{ChannelReporter, NoOpProgressReporter, ProgressReporter, RunEvent};
pub use crate::stats::RunStats;
pub use crate::utils::{format_duration, is_supported_image};
pub use crate::worker::{RunHandle, Runner, StartError};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Summary of one finished run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub quality: u8,
    pub scale: f64,
    pub processed_files: u64,
    pub failed_files: u64,
    pub ignored_files: u64,
    pub directories: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub space_saved: f64,
    pub errors: Vec<String>,
    pub outcome: RunOutcome,
}

/// How a run ended
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every candidate file was written
    Succeeded,
    /// The walk completed but some files or directories failed
    PartiallyFailed { failed: u64 },
    /// The run could not proceed at all
    Failed { error: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Succeeded => write!(f, "succeeded"),
            RunOutcome::PartiallyFailed { failed } => {
                write!(f, "finished with {failed} failure(s)")
            }
            RunOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Extension given to written files.
///
/// The bytes are always JPEG. `Png` reproduces the naming that existing
/// output trees were produced with; `Jpg` names files after their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputExtension {
    #[default]
    Png,
    Jpg,
}

impl OutputExtension {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputExtension::Png => "png",
            OutputExtension::Jpg => "jpg",
        }
    }
}

impl FromStr for OutputExtension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(OutputExtension::Png),
            "jpg" | "jpeg" => Ok(OutputExtension::Jpg),
            other => bail!("Unknown output extension: {other}"),
        }
    }
}

/// Interpolation used when shrinking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "triangle" | "bilinear" => Ok(ResizeFilter::Triangle),
            "catmull-rom" | "catmullrom" => Ok(ResizeFilter::CatmullRom),
            "lanczos3" | "lanczos" => Ok(ResizeFilter::Lanczos3),
            other => bail!("Unknown resize filter: {other}"),
        }
    }
}

/// Report output formats
#[derive(Debug, Clone, PartialEq)]
pub enum ReportFormat {
    Json,
    Csv,
}

impl ReportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => bail!("Unknown report format: {other}"),
        }
    }
}

/// Write `imgshrink_report.<ext>` into the working directory
pub fn generate_report(report: &RunReport, format: &ReportFormat) -> Result<PathBuf> {
    let path = PathBuf::from(format!("imgshrink_report.{}", format.extension()));
    write_report(report, format, &path)?;
    log::info!("Report saved to: {}", path.display());
    Ok(path)
}

/// Write a report in the given format to `path`
pub fn write_report(report: &RunReport, format: &ReportFormat, path: &Path) -> Result<()> {
    match format {
        ReportFormat::Json => write_json_report(report, path),
        ReportFormat::Csv => write_csv_report(report, path),
    }
    .with_context(|| format!("Failed to write report: {}", path.display()))
}

fn write_json_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn write_csv_report(report: &RunReport, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let rows = [
        ("start_time", report.start_time.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("end_time", report.end_time.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("duration_seconds", format!("{:.3}", report.duration.as_secs_f64())),
        ("input_dir", report.input_dir.display().to_string()),
        ("output_dir", report.output_dir.display().to_string()),
        ("quality", report.quality.to_string()),
        ("scale", report.scale.to_string()),
        ("processed_files", report.processed_files.to_string()),
        ("failed_files", report.failed_files.to_string()),
        ("ignored_files", report.ignored_files.to_string()),
        ("directories", report.directories.to_string()),
        ("original_size_bytes", report.original_size.to_string()),
        ("compressed_size_bytes", report.compressed_size.to_string()),
        ("space_saved", format!("{:.4}", report.space_saved)),
        ("outcome", report.outcome.to_string()),
    ];

    writer.write_record(["metric", "value"])?;
    for (metric, value) in rows {
        writer.write_record([metric, value.as_str()])?;
    }
    for error in &report.errors {
        writer.write_record(["error", error.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
