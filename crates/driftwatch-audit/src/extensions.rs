//! Extension frequency survey.
//!
//! Answers "what is actually on this drive?" before an allow-list is
//! written: walks a root and counts file extensions, lowercased, with a
//! bucket for extensionless files. Reads no file content.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use driftwatch_core::{AuditError, AuditWarning};

/// Bucket name for files without an extension.
pub const NO_EXTENSION: &str = "<no_extension>";

/// Extension counts for one root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionReport {
    /// Root that was surveyed.
    pub root: PathBuf,
    /// Total regular files counted.
    pub total_files: u64,
    /// (extension, count) pairs, most common first.
    pub counts: Vec<(String, u64)>,
    /// Subtrees that could not be enumerated.
    pub warnings: Vec<AuditWarning>,
}

impl ExtensionReport {
    /// The `n` most common extensions.
    pub fn top(&self, n: usize) -> &[(String, u64)] {
        &self.counts[..self.counts.len().min(n)]
    }
}

/// Walk a root and count file extensions.
pub fn survey_extensions(root: &Path) -> Result<ExtensionReport, AuditError> {
    let root = root.canonicalize().map_err(|e| AuditError::io(root, e))?;
    if !root.is_dir() {
        return Err(AuditError::NotADirectory { path: root });
    }

    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut total_files = 0u64;
    let mut warnings = Vec::new();

    let walker = jwalk::WalkDir::new(&root)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::Serial);

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                warnings.push(AuditWarning::enumeration(path, err.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        total_files += 1;

        let name = entry.file_name().to_string_lossy().to_string();
        let bucket = match Path::new(&name).extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
            None => NO_EXTENSION.to_string(),
        };
        *counts.entry(bucket).or_default() += 1;
    }

    let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
    // Most common first; ties break alphabetically for stable output.
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(ExtensionReport {
        root,
        total_files,
        counts,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("a.JPG"), "x").unwrap();
        std::fs::write(root.join("b.jpg"), "x").unwrap();
        std::fs::write(root.join("sub/c.jpg"), "x").unwrap();
        std::fs::write(root.join("d.mp4"), "x").unwrap();
        std::fs::write(root.join("README"), "x").unwrap();
        temp
    }

    #[test]
    fn test_survey_counts_and_order() {
        let temp = create_tree();
        let report = survey_extensions(temp.path()).unwrap();

        assert_eq!(report.total_files, 5);
        assert_eq!(report.counts[0], (".jpg".to_string(), 3));
        assert!(report.counts.contains(&(".mp4".to_string(), 1)));
        assert!(report.counts.contains(&(NO_EXTENSION.to_string(), 1)));
    }

    #[test]
    fn test_top_limits_output() {
        let temp = create_tree();
        let report = survey_extensions(temp.path()).unwrap();
        assert_eq!(report.top(1).len(), 1);
        assert_eq!(report.top(100).len(), report.counts.len());
    }

    #[test]
    fn test_survey_rejects_file_root() {
        let temp = create_tree();
        let file = temp.path().join("a.JPG");
        assert!(matches!(
            survey_extensions(&file),
            Err(AuditError::NotADirectory { .. })
        ));
    }
}
