//! Error taxonomy for audit runs.
//!
//! Only store-level unavailability is fatal; per-file and per-directory
//! failures are recovered and surfaced as warnings so a multi-hour walk
//! is never aborted by one unreadable entry.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort an audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store cannot be opened or written.
    #[error("Inventory store unavailable at {path}: {message}")]
    StoreUnavailable { path: PathBuf, message: String },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// I/O error outside the per-file recovery paths (e.g. resolving the root).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl AuditError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a store-unavailable error with path context.
    pub fn store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Kind of recovered, non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// A file disappeared or became unreadable mid-hash; its prior record
    /// state was left untouched.
    ReadError,
    /// A directory subtree could not be enumerated and was skipped.
    Enumeration,
    /// Metadata for an entry could not be read.
    MetadataError,
}

/// Non-fatal warning recovered during a walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl AuditWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a read-error warning for a skipped file.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }

    /// Create an enumeration warning for a skipped subtree.
    pub fn enumeration(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: WarningKind::Enumeration,
        }
    }

    /// Create a metadata warning for an entry whose stat failed.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind: WarningKind::MetadataError,
        }
    }
}

impl std::fmt::Display for AuditWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = AuditError::store("/mnt/backup/inventory.db", "disk full");
        let msg = err.to_string();
        assert!(msg.contains("inventory.db"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_warning_constructors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let warning = AuditWarning::read_error("/data/file.bin", &io);
        assert_eq!(warning.kind, WarningKind::ReadError);
        assert!(warning.message.contains("denied"));

        let warning = AuditWarning::enumeration("/data/dir", "loop detected");
        assert_eq!(warning.kind, WarningKind::Enumeration);

        let warning = AuditWarning::metadata("/data/odd.bin", "stat failed");
        assert_eq!(warning.kind, WarningKind::MetadataError);
        assert_eq!(warning.message, "stat failed");
    }
}
