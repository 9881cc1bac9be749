//! Audit configuration.
//!
//! All knobs the orchestrator needs are carried in one explicit value;
//! there is no process-wide configuration state.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Default chunk size for streaming hashes (1 MiB).
pub const DEFAULT_HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Configuration for one audit run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct AuditConfig {
    /// Root path to audit (absolute).
    pub root: PathBuf,

    /// Extension allow-list (e.g. `[".jpg", ".mp4"]`). Empty = all files.
    ///
    /// This is a content-type filter: files outside it are not hashed and
    /// not touched, but they are also excluded from the sweep so they are
    /// never reported missing.
    #[builder(default)]
    #[serde(default)]
    pub ext_filter: Vec<String>,

    /// Glob patterns for paths to exclude from the walk entirely.
    #[builder(default)]
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Recompute every digest regardless of metadata (full verification pass).
    #[builder(default = "false")]
    #[serde(default)]
    pub force_verify: bool,

    /// Verification sampling cadence for metadata-unchanged files:
    /// hash every Nth unchanged file to catch bit-rot. 0 disables sampling.
    #[builder(default = "0")]
    #[serde(default)]
    pub verify_every: u64,

    /// Chunk size for streaming hashes, in bytes.
    #[builder(default = "DEFAULT_HASH_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub hash_chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_HASH_CHUNK_SIZE
}

impl AuditConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if !root.as_os_str().is_empty() => {}
            Some(_) => return Err("Root path cannot be empty".to_string()),
            None => return Err("Root path is required".to_string()),
        }
        if let Some(0) = self.hash_chunk_size {
            return Err("Hash chunk size must be non-zero".to_string());
        }
        Ok(())
    }
}

impl AuditConfig {
    /// Create a new config builder.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder::default()
    }

    /// Create a simple config for auditing a root with defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ext_filter: Vec::new(),
            exclude_patterns: Vec::new(),
            force_verify: false,
            verify_every: 0,
            hash_chunk_size: DEFAULT_HASH_CHUNK_SIZE,
        }
    }

    /// Load a config from a JSON file, e.g. a checked-in `auditor.json`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
        let mut config: Self = serde_json::from_str(&raw)
            .map_err(|e| AuditError::config(format!("{}: {e}", path.display())))?;
        config.ext_filter = config
            .ext_filter
            .iter()
            .map(|e| normalize_extension(e))
            .collect();
        Ok(config)
    }

    /// Check whether a file name passes the extension allow-list.
    pub fn matches_extension(&self, name: &str) -> bool {
        if self.ext_filter.is_empty() {
            return true;
        }
        match Path::new(name).extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.ext_filter.iter().any(|allowed| *allowed == ext)
            }
            None => false,
        }
    }

    /// Compile the exclusion patterns into a matcher.
    pub fn exclusion_matcher(&self) -> Result<GlobSet, AuditError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| AuditError::config(format!("bad exclude pattern {pattern:?}: {e}")))?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| AuditError::config(format!("exclude patterns: {e}")))
    }
}

/// Normalize an extension to lowercase with a leading dot.
pub(crate) fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = AuditConfig::builder()
            .root("/mnt/backup")
            .ext_filter(vec![".jpg".to_string()])
            .force_verify(true)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/mnt/backup"));
        assert!(config.force_verify);
        assert_eq!(config.verify_every, 0);
    }

    #[test]
    fn test_builder_rejects_empty_root() {
        let result = AuditConfig::builder().root("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_matches_extension() {
        let mut config = AuditConfig::new("/mnt/backup");
        assert!(config.matches_extension("anything.bin"));
        assert!(config.matches_extension("no_extension"));

        config.ext_filter = vec![".jpg".to_string(), ".mp4".to_string()];
        assert!(config.matches_extension("photo.jpg"));
        assert!(config.matches_extension("PHOTO.JPG"));
        assert!(config.matches_extension("clip.mp4"));
        assert!(!config.matches_extension("document.pdf"));
        assert!(!config.matches_extension("no_extension"));
    }

    #[test]
    fn test_exclusion_matcher() {
        let config = AuditConfig::builder()
            .root("/mnt/backup")
            .exclude_patterns(vec!["**/.git/**".to_string(), "**/*.tmp".to_string()])
            .build()
            .unwrap();

        let matcher = config.exclusion_matcher().unwrap();
        assert!(matcher.is_match("/mnt/backup/repo/.git/config"));
        assert!(matcher.is_match("/mnt/backup/scratch/file.tmp"));
        assert!(!matcher.is_match("/mnt/backup/photos/trip.jpg"));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auditor.json");
        std::fs::write(
            &path,
            r#"{"root": "/mnt/backup", "ext_filter": ["JPG", ".mp4"], "verify_every": 50}"#,
        )
        .unwrap();

        let config = AuditConfig::from_json_file(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/mnt/backup"));
        assert_eq!(config.ext_filter, vec![".jpg", ".mp4"]);
        assert_eq!(config.verify_every, 50);
        assert_eq!(config.hash_chunk_size, DEFAULT_HASH_CHUNK_SIZE);
    }

    #[test]
    fn test_from_json_file_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auditor.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            AuditConfig::from_json_file(&path),
            Err(AuditError::InvalidConfig { .. })
        ));
    }
}
