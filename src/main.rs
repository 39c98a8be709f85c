use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use imgshrink::{
    Config, JobParameters, OutputExtension, ProgressReporter, ReportFormat, ResizeFilter,
    RunOutcome, RunReport, Runner, format_duration, generate_report,
    progress::ConsoleProgressReporter,
};

/// imgshrink - batch image downscaler
///
/// Walks a directory tree, shrinks every JPEG/PNG/DNG image and writes it as
/// JPEG into a mirrored output tree
#[derive(Parser)]
#[command(name = "imgshrink")]
#[command(about = "imgshrink - batch downscale images into a mirrored JPEG tree")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = r#"
imgshrink walks an input directory recursively and, for every .jpg, .jpeg,
.png or .dng file, writes a copy shrunk by the scale factor and re-encoded as
JPEG to the same relative location under the output directory.

Output files are named <stem>.png by default (the content is JPEG); pass
--extension jpg to name them after their content.
"#)]
pub struct Args {
    /// Input directory path
    #[arg(short, long, value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Output directory path (defaults to input_dir/imgshrink_output)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// JPEG quality (1-100) [default: 80]
    #[arg(
        short,
        long,
        value_name = "QUALITY",
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub quality: Option<u8>,

    /// Scale factor applied to width and height (0 < scale <= 1) [default: 0.5]
    #[arg(short, long, value_name = "FACTOR")]
    pub scale: Option<f64>,

    /// Extension of written files
    #[arg(long, value_enum)]
    pub extension: Option<OutputExtensionArg>,

    /// Interpolation filter used when shrinking
    #[arg(long, value_enum)]
    pub filter: Option<ResizeFilterArg>,

    /// Dry run mode - decode and report without writing anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Verbose output mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (results only)
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate run report
    #[arg(long)]
    pub report: bool,

    /// Report output format
    #[arg(long, value_enum)]
    pub report_format: Option<ReportFormatArg>,

    /// Configuration file path (defaults to the per-user config file if present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use a predefined configuration profile
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputExtensionArg {
    /// <stem>.png holding JPEG data (matches earlier output trees)
    Png,
    /// <stem>.jpg
    Jpg,
}

impl From<OutputExtensionArg> for OutputExtension {
    fn from(extension: OutputExtensionArg) -> Self {
        match extension {
            OutputExtensionArg::Png => OutputExtension::Png,
            OutputExtensionArg::Jpg => OutputExtension::Jpg,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ResizeFilterArg {
    Nearest,
    /// Bilinear
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilterArg> for ResizeFilter {
    fn from(filter: ResizeFilterArg) -> Self {
        match filter {
            ResizeFilterArg::Nearest => ResizeFilter::Nearest,
            ResizeFilterArg::Triangle => ResizeFilter::Triangle,
            ResizeFilterArg::CatmullRom => ResizeFilter::CatmullRom,
            ResizeFilterArg::Lanczos3 => ResizeFilter::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ReportFormatArg {
    Json,
    Csv,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(format: ReportFormatArg) -> Self {
        match format {
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Csv => ReportFormat::Csv,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(RunOutcome::Succeeded) => 0,
        Ok(RunOutcome::PartiallyFailed { .. }) => 2,
        Ok(RunOutcome::Failed { .. }) => 1,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run() -> Result<RunOutcome> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Some(Config::load(path)?),
        None => Config::discover()?,
    };
    let output_config = config.as_ref().and_then(|c| c.output.as_ref());

    let verbose = args.verbose || output_config.and_then(|o| o.verbose).unwrap_or(false);
    let quiet =
        args.quiet || (!args.verbose && output_config.and_then(|o| o.quiet).unwrap_or(false));

    // Initialize logging
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if !quiet {
        // Run events are rendered by the console reporter
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    let params = build_parameters(&args, config.as_ref())?;

    let generate = args.report || output_config.and_then(|o| o.generate_report).unwrap_or(false);
    let configured_format = output_config.and_then(|o| o.report_format.as_deref());
    let report_format: ReportFormat = match (args.report_format.clone(), configured_format) {
        (Some(format), _) => format.into(),
        (None, Some(format)) => format.parse()?,
        (None, None) => ReportFormat::Json,
    };

    let runner = Runner::new();
    let handle = runner.start(params)?;

    // Drain events on this thread until the worker hangs up
    let console = (!quiet).then(ConsoleProgressReporter::new);
    for event in handle.events().iter() {
        if let Some(console) = &console {
            console.report(event);
        }
    }
    let report = handle.wait()?;

    if generate {
        let path = generate_report(&report, &report_format)?;
        if !quiet {
            println!("Report saved to: {}", path.display());
        }
    }

    print_results_summary(&report);

    Ok(report.outcome)
}

/// Built-in defaults, then the config file and profile, then explicit flags
fn build_parameters(args: &Args, config: Option<&Config>) -> Result<JobParameters> {
    let mut params = JobParameters::default();
    if let Some(config) = config {
        params = config.apply(params, args.profile.as_deref())?;
    } else if let Some(profile) = &args.profile {
        anyhow::bail!("Profile '{profile}' requested but no config file was found");
    }

    if let Some(input) = &args.input {
        params.input_dir = input.clone();
    }
    if let Some(output) = &args.output {
        params.output_dir = Some(output.clone());
    }
    if let Some(quality) = args.quality {
        params = params.with_quality(quality);
    }
    if let Some(scale) = args.scale {
        params = params.with_scale(scale);
    }
    if let Some(extension) = args.extension.clone() {
        params = params.with_extension(extension.into());
    }
    if let Some(filter) = args.filter.clone() {
        params = params.with_filter(filter.into());
    }
    if args.dry_run {
        params = params.with_dry_run(true);
    }

    params.validate().context("Invalid arguments")?;
    Ok(params)
}

fn print_results_summary(report: &RunReport) {
    use humansize::{DECIMAL, format_size};

    println!("\n📊 Results Summary ({}):", report.outcome);
    println!("  ✅ Processed: {} files", report.processed_files);
    if report.failed_files > 0 {
        println!("  ❌ Failed: {}", report.failed_files);
    }
    if report.ignored_files > 0 {
        println!("  ⏭️ Ignored: {} files", report.ignored_files);
    }
    println!("  📁 Directories mirrored: {}", report.directories);

    if report.compressed_size > 0 {
        println!("\n💾 Space Analysis:");
        println!("  📦 Original size: {}", format_size(report.original_size, DECIMAL));
        println!("  🗜️ Compressed size: {}", format_size(report.compressed_size, DECIMAL));
        println!("  💾 Space saved: {:.1}%", report.space_saved * 100.0);
    }

    println!("\n⏱️ Duration: {}", format_duration(report.duration));

    if !report.errors.is_empty() && report.errors.len() <= 5 {
        println!("\n❌ Errors:");
        for error in &report.errors {
            println!("  • {}", error);
        }
    } else if report.errors.len() > 5 {
        println!("\n❌ {} errors occurred (use --report for full details)", report.errors.len());
    }
}
