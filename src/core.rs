use anyhow::{Context, Result, bail};
use chrono::Utc;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::{
    RunOutcome, RunReport,
    config::{JobParameters, ParameterError},
    converter::ImageConverter,
    progress::{ProgressReporter, RunEvent},
    stats::RunStats,
    utils::{is_supported_image, output_file_name},
};

/// Walks the input tree and writes a shrunk JPEG for every supported image
/// into the mirrored location under the output directory.
///
/// Files are handled one at a time in walk order. Per-file and per-directory
/// failures are reported and skipped; only an unusable input or output root
/// ends the run early.
pub struct BatchTransformer {
    params: JobParameters,
    converter: ImageConverter,
    stats: RunStats,
}

/// Why a single file was skipped
enum FileFailure {
    /// The bytes are not a decodable image
    Unreadable(anyhow::Error),
    Failed(anyhow::Error),
}

impl BatchTransformer {
    /// Create a transformer, rejecting out-of-range parameters
    pub fn new(params: JobParameters) -> Result<Self, ParameterError> {
        params.validate()?;
        let converter = ImageConverter::new(params.quality, params.scale, params.filter);
        Ok(Self {
            params,
            converter,
            stats: RunStats::new(),
        })
    }

    /// Run the complete walk
    pub fn run(&mut self) -> RunReport {
        self.run_with_progress(None)
    }

    /// Run the walk, sending every event to `reporter`.
    ///
    /// Never fails: problems end up as events, in the statistics and in the
    /// report's outcome.
    pub fn run_with_progress(&mut self, reporter: Option<&dyn ProgressReporter>) -> RunReport {
        let report = self.run_unfinished(reporter);
        emit(reporter, RunEvent::Finished(report.clone()));
        report
    }

    /// Like [`run_with_progress`](Self::run_with_progress), but leaves sending
    /// [`RunEvent::Finished`] to the caller.
    pub(crate) fn run_unfinished(&mut self, reporter: Option<&dyn ProgressReporter>) -> RunReport {
        let start_time = Instant::now();
        let start_time_utc = Utc::now();
        self.stats = RunStats::new();

        let input_dir = self.params.input_dir.clone();
        let output_dir = self.params.get_output_dir();

        log::info!(
            "Shrinking images from {} into {} (quality {}, scale {})",
            input_dir.display(),
            output_dir.display(),
            self.params.quality,
            self.params.scale
        );
        emit(
            reporter,
            RunEvent::Started {
                input_dir: input_dir.clone(),
                output_dir: output_dir.clone(),
            },
        );

        let walked = panic::catch_unwind(AssertUnwindSafe(|| {
            self.walk(&input_dir, &output_dir, reporter)
        }));

        let outcome = match walked {
            Ok(Ok(())) => self.stats.outcome(),
            Ok(Err(e)) => {
                log::error!("Run failed: {e:#}");
                RunOutcome::Failed {
                    error: format!("{e:#}"),
                }
            }
            Err(payload) => {
                let error = panic_message(payload.as_ref());
                log::error!("Run aborted: {error}");
                RunOutcome::Failed { error }
            }
        };

        let report = RunReport {
            start_time: start_time_utc,
            end_time: Utc::now(),
            duration: start_time.elapsed(),
            input_dir,
            output_dir,
            quality: self.params.quality,
            scale: self.params.scale,
            processed_files: self.stats.processed_count,
            failed_files: self.stats.error_count,
            ignored_files: self.stats.ignored_count,
            directories: self.stats.directory_count,
            original_size: self.stats.original_size,
            compressed_size: self.stats.compressed_size,
            space_saved: self.stats.space_saved(),
            errors: self.stats.get_errors(),
            outcome,
        };

        log::info!(
            "Run {} ({} processed, {} failed)",
            report.outcome,
            report.processed_files,
            report.failed_files
        );
        report
    }

    fn walk(
        &mut self,
        input_dir: &Path,
        output_dir: &Path,
        reporter: Option<&dyn ProgressReporter>,
    ) -> Result<()> {
        let metadata = fs::metadata(input_dir)
            .with_context(|| format!("Cannot access input directory: {}", input_dir.display()))?;
        if !metadata.is_dir() {
            bail!("Input path is not a directory: {}", input_dir.display());
        }

        if !self.params.dry_run {
            fs::create_dir_all(output_dir).with_context(|| {
                format!("Failed to create output directory: {}", output_dir.display())
            })?;
        }

        // An output tree nested inside the input tree must not be walked.
        let output_canonical = fs::canonicalize(output_dir).ok();

        let mut entries = WalkDir::new(input_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e).with_context(|| {
                        format!("Failed to list input directory: {}", input_dir.display())
                    });
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| input_dir.to_path_buf());
                    // Dangling symlinks surface here too; only real
                    // directories are directory failures.
                    if path.is_dir() {
                        self.directory_failed(path, e.to_string(), reporter);
                    } else if is_supported_image(&path) {
                        self.file_failed(&path, e.to_string(), reporter);
                    } else {
                        self.stats.record_ignored();
                    }
                    continue;
                }
            };

            let Ok(relative) = entry.path().strip_prefix(input_dir) else {
                continue;
            };
            let target = output_dir.join(relative);

            if entry.file_type().is_dir() {
                if entry.depth() == 0 {
                    continue;
                }
                if output_canonical.is_some()
                    && fs::canonicalize(entry.path()).ok() == output_canonical
                {
                    log::debug!("Skipping output directory {}", entry.path().display());
                    entries.skip_current_dir();
                    continue;
                }
                if let Err(e) = self.mirror_directory(&target) {
                    self.directory_failed(entry.path().to_path_buf(), format!("{e:#}"), reporter);
                    entries.skip_current_dir();
                    continue;
                }
                self.stats.record_directory();
            } else if entry.file_type().is_file() && is_supported_image(entry.path()) {
                let name = output_file_name(entry.path(), self.params.extension.as_str());
                let destination = target.with_file_name(name);
                self.handle_file(entry.path(), &destination, reporter);
            } else {
                log::trace!("Ignoring {}", entry.path().display());
                self.stats.record_ignored();
            }
        }

        Ok(())
    }

    fn mirror_directory(&self, target: &Path) -> Result<()> {
        if self.params.dry_run {
            return Ok(());
        }
        fs::create_dir_all(target)
            .with_context(|| format!("Failed to create directory: {}", target.display()))
    }

    fn handle_file(
        &mut self,
        path: &Path,
        destination: &Path,
        reporter: Option<&dyn ProgressReporter>,
    ) {
        match self.process_file(path, destination) {
            Ok(event) => {
                if let RunEvent::FileProcessed {
                    original_size,
                    compressed_size,
                    ..
                } = &event
                {
                    self.stats.record_success(*original_size, *compressed_size);
                }
                log::debug!("{event}");
                emit(reporter, event);
            }
            Err(FileFailure::Unreadable(e)) => {
                log::warn!("Could not read file {}: {e:#}", path.display());
                self.stats.record_error(path, "Could not read file");
                emit(
                    reporter,
                    RunEvent::FileUnreadable {
                        path: path.to_path_buf(),
                    },
                );
            }
            Err(FileFailure::Failed(e)) => self.file_failed(path, format!("{e:#}"), reporter),
        }
    }

    /// Decode, shrink, encode and write one file
    fn process_file(&self, path: &Path, destination: &Path) -> Result<RunEvent, FileFailure> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map_err(FileFailure::Failed)?;
        let img = self
            .converter
            .decode(&bytes)
            .map_err(FileFailure::Unreadable)?;

        if self.params.dry_run {
            return Ok(RunEvent::FileProcessed {
                path: path.to_path_buf(),
                output: destination.to_path_buf(),
                original_dimensions: (img.width(), img.height()),
                dimensions: self.converter.target_dimensions(&img),
                original_size: bytes.len() as u64,
                compressed_size: 0,
            });
        }

        let encoded = self
            .converter
            .transform(&img)
            .map_err(FileFailure::Failed)?;
        write_output(destination, &encoded.bytes).map_err(FileFailure::Failed)?;

        Ok(RunEvent::FileProcessed {
            path: path.to_path_buf(),
            output: destination.to_path_buf(),
            original_dimensions: encoded.original_dimensions,
            dimensions: encoded.dimensions,
            original_size: bytes.len() as u64,
            compressed_size: encoded.bytes.len() as u64,
        })
    }

    fn file_failed(&mut self, path: &Path, error: String, reporter: Option<&dyn ProgressReporter>) {
        log::warn!("Failed to process {}: {error}", path.display());
        self.stats.record_error(path, error.clone());
        emit(
            reporter,
            RunEvent::FileFailed {
                path: path.to_path_buf(),
                error,
            },
        );
    }

    fn directory_failed(
        &mut self,
        path: PathBuf,
        error: String,
        reporter: Option<&dyn ProgressReporter>,
    ) {
        log::warn!("Error in directory {}: {error}", path.display());
        self.stats.record_error(&path, error.clone());
        emit(reporter, RunEvent::DirectoryFailed { path, error });
    }
}

fn write_output(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(destination, bytes)
        .with_context(|| format!("Failed to write {}", destination.display()))
}

fn emit(reporter: Option<&dyn ProgressReporter>, event: RunEvent) {
    if let Some(reporter) = reporter {
        reporter.report(event);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic during run".to_string()
    }
}
