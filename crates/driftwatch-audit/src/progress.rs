//! Audit progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Progress snapshot during an audit run.
#[derive(Debug, Clone)]
pub struct AuditProgress {
    /// Number of files classified so far.
    pub files_scanned: u64,
    /// Number of files routed through the hashing engine.
    pub files_hashed: u64,
    /// Total bytes hashed so far.
    pub bytes_hashed: u64,
    /// Current path being processed.
    pub current_path: PathBuf,
    /// Number of warnings recovered so far.
    pub warnings_count: u64,
    /// Time elapsed since the walk started.
    pub elapsed: Duration,
}

impl AuditProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_scanned: 0,
            files_hashed: 0,
            bytes_hashed: 0,
            current_path: PathBuf::new(),
            warnings_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Classification rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Hashing throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_hashed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

impl Default for AuditProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_are_zero_before_any_elapsed_time() {
        let progress = AuditProgress::new();
        assert_eq!(progress.files_per_second(), 0.0);
        assert_eq!(progress.bytes_per_second(), 0.0);
    }

    #[test]
    fn test_rates_with_elapsed_time() {
        let progress = AuditProgress {
            files_scanned: 100,
            bytes_hashed: 2_000,
            elapsed: Duration::from_secs(2),
            ..AuditProgress::new()
        };
        assert_eq!(progress.files_per_second(), 50.0);
        assert_eq!(progress.bytes_per_second(), 1_000.0);
    }
}
