use std::path::Path;

use crate::RunOutcome;

/// Counters collected while a run walks the tree
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub processed_count: u64,
    pub error_count: u64,
    pub ignored_count: u64,
    pub directory_count: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    errors: Vec<ErrorRecord>,
}

#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub path: String,
    pub error_message: String,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, original_size: u64, compressed_size: u64) {
        self.processed_count += 1;
        self.original_size += original_size;
        self.compressed_size += compressed_size;
    }

    pub fn record_error(&mut self, path: &Path, error: impl Into<String>) {
        self.error_count += 1;
        self.errors.push(ErrorRecord {
            path: path.display().to_string(),
            error_message: error.into(),
        });
    }

    pub fn record_ignored(&mut self) {
        self.ignored_count += 1;
    }

    pub fn record_directory(&mut self) {
        self.directory_count += 1;
    }

    /// Fraction of the input bytes no longer needed, 0 when nothing was read
    pub fn space_saved(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        let saved = self.original_size.saturating_sub(self.compressed_size);
        saved as f64 / self.original_size as f64
    }

    pub fn get_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.error_message))
            .collect()
    }

    pub fn error_records(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Outcome of a walk that ran to the end
    pub fn outcome(&self) -> RunOutcome {
        if self.error_count == 0 {
            RunOutcome::Succeeded
        } else {
            RunOutcome::PartiallyFailed {
                failed: self.error_count,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_tracks_failures() {
        let mut stats = RunStats::new();
        stats.record_success(1000, 250);
        assert_eq!(stats.outcome(), RunOutcome::Succeeded);

        stats.record_error(Path::new("a/broken.png"), "Could not read file");
        stats.record_error(Path::new("a/locked.jpg"), "Permission denied");
        assert_eq!(stats.outcome(), RunOutcome::PartiallyFailed { failed: 2 });
        assert_eq!(stats.error_records().len(), 2);
        assert_eq!(
            stats.get_errors()[0],
            format!("{}: Could not read file", Path::new("a/broken.png").display())
        );
    }

    #[test]
    fn space_saved_is_a_fraction() {
        let mut stats = RunStats::new();
        assert_eq!(stats.space_saved(), 0.0);
        stats.record_success(1000, 250);
        assert!((stats.space_saved() - 0.75).abs() < 1e-9);
        stats.record_success(0, 2000);
        assert_eq!(stats.space_saved(), 0.0);
    }
}
