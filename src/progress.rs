use crossbeam_channel::Sender;
use std::fmt;
use std::path::PathBuf;

use crate::RunReport;
use crate::utils::display_name;

/// One status message emitted by a run, in processing order
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        input_dir: PathBuf,
        output_dir: PathBuf,
    },
    FileProcessed {
        path: PathBuf,
        output: PathBuf,
        original_dimensions: (u32, u32),
        dimensions: (u32, u32),
        original_size: u64,
        compressed_size: u64,
    },
    /// The file has a supported extension but did not decode
    FileUnreadable { path: PathBuf },
    FileFailed { path: PathBuf, error: String },
    DirectoryFailed { path: PathBuf, error: String },
    /// Always the last event of a run
    Finished(RunReport),
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunEvent::Started {
                input_dir,
                output_dir,
            } => write!(
                f,
                "Started: {} -> {}",
                input_dir.display(),
                output_dir.display()
            ),
            RunEvent::FileProcessed {
                path,
                original_dimensions: (w, h),
                dimensions: (nw, nh),
                ..
            } => write!(
                f,
                "Processed image: {} ({w}x{h} -> {nw}x{nh})",
                display_name(path)
            ),
            RunEvent::FileUnreadable { path } => {
                write!(f, "Could not read file {}", display_name(path))
            }
            RunEvent::FileFailed { path, error } => {
                write!(f, "Error processing file {}: {error}", display_name(path))
            }
            RunEvent::DirectoryFailed { path, error } => {
                write!(f, "Error in directory {}: {error}", path.display())
            }
            RunEvent::Finished(report) => write!(f, "Finished: {}", report.outcome),
        }
    }
}

/// Trait for receiving run events.
/// This allows different interfaces (CLI, GUI) to implement their own progress display
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: RunEvent);
}

/// A no-op progress reporter for when progress reporting is not needed
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report(&self, _event: RunEvent) {}
}

/// Forwards events to another thread over a channel
pub struct ChannelReporter {
    sender: Sender<RunEvent>,
}

impl ChannelReporter {
    pub fn new(sender: Sender<RunEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, event: RunEvent) {
        // A closed receiver means nobody is watching; the run carries on.
        if self.sender.send(event).is_err() {
            log::trace!("Event receiver dropped");
        }
    }
}

/// Console-based progress reporter using indicatif
#[cfg(feature = "cli")]
pub struct ConsoleProgressReporter {
    spinner: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ConsoleProgressReporter {
    pub fn new() -> Self {
        let spinner = indicatif::ProgressBar::new_spinner();
        spinner.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} images {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { spinner }
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for ConsoleProgressReporter {
    fn report(&self, event: RunEvent) {
        match &event {
            RunEvent::Started { .. } => {
                self.spinner.set_message("Shrinking images...");
                self.spinner.println(format!("▶ {event}"));
            }
            RunEvent::FileProcessed { .. } => {
                self.spinner.inc(1);
                self.spinner.println(format!("✅ {event}"));
            }
            RunEvent::FileUnreadable { .. }
            | RunEvent::FileFailed { .. }
            | RunEvent::DirectoryFailed { .. } => {
                self.spinner.println(format!("❌ {event}"));
            }
            RunEvent::Finished(report) => {
                self.spinner
                    .finish_with_message(format!("- {}", report.outcome));
            }
        }
    }
}
