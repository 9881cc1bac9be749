//! Duplicate report artifacts.
//!
//! Three renderings of one [`DuplicateReport`]: a timestamped JSON
//! artifact for downstream tooling, a grouped text report for manual
//! review, and a CSV export where each row is a file annotated with the
//! paths of its other copies.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use driftwatch_core::AuditError;

use crate::resolver::DuplicateReport;

/// Timestamp format used in artifact file names.
const ARTIFACT_TIMESTAMP: &str = "%Y-%m-%d_%H-%M-%S";

/// Write the report as `duplicates_<timestamp>.json` into `dir`.
/// Returns the artifact path.
pub fn write_json_artifact(report: &DuplicateReport, dir: &Path) -> Result<PathBuf, AuditError> {
    std::fs::create_dir_all(dir).map_err(|e| AuditError::io(dir, e))?;
    let name = format!(
        "duplicates_{}.json",
        report.generated_at.format(ARTIFACT_TIMESTAMP)
    );
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| AuditError::config(format!("report serialization: {e}")))?;
    std::fs::write(&path, json).map_err(|e| AuditError::io(&path, e))?;
    Ok(path)
}

/// Render a human-readable grouped report.
pub fn render_text(report: &DuplicateReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(70);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, " IDENTICAL FILES REPORT");
    let _ = writeln!(out, " Root: {}", report.root.display());
    let _ = writeln!(out, " Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    if report.groups.is_empty() {
        let _ = writeln!(out, "No novel duplicate groups.");
        if report.suppressed > 0 {
            let _ = writeln!(out, "({} acknowledged group(s) suppressed)", report.suppressed);
        }
        return out;
    }

    for (index, group) in report.groups.iter().enumerate() {
        let _ = writeln!(out, "--- Group {} ---", index + 1);
        let _ = writeln!(out, "Hash:  {}", group.hash.to_hex());
        let _ = writeln!(out, "Size:  {} per file", format_size(group.size));
        let _ = writeln!(out, "Count: {} identical copies", group.count());
        let _ = writeln!(out);
        for (member_index, member) in group.members.iter().enumerate() {
            let _ = writeln!(out, "  {}. Path: {}", member_index + 1, member.path.display());
            let _ = writeln!(
                out,
                "     Date: {}",
                member.modified_at().format("%Y-%m-%d %H:%M:%S")
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "-".repeat(70));
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "{} group(s), {} redundant file(s), {} reclaimable",
        report.groups.len(),
        report.redundant_files(),
        format_size(report.total_wasted_bytes)
    );
    if report.suppressed > 0 {
        let _ = writeln!(out, "{} acknowledged group(s) suppressed", report.suppressed);
    }
    out
}

/// Render a CSV export: one row per file, including the paths of the
/// other identical copies.
pub fn render_csv(report: &DuplicateReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Group ID,File Path,Modified Date,Size,Hash,Total Copies,Paths of Other Copies"
    );

    for (index, group) in report.groups.iter().enumerate() {
        for member in &group.members {
            let others: Vec<String> = group
                .members
                .iter()
                .filter(|m| m.path != member.path)
                .map(|m| m.path.display().to_string())
                .collect();
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{}",
                index + 1,
                csv_field(&member.path.display().to_string()),
                member.modified_at().format("%Y-%m-%d %H:%M:%S"),
                format_size(group.size),
                group.hash.to_hex(),
                group.count(),
                csv_field(&others.join(" | ")),
            );
        }
    }
    out
}

/// Quote a CSV field when it contains a separator, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DuplicateGroup, DuplicateMember};
    use chrono::Utc;
    use driftwatch_core::ContentHash;
    use std::path::PathBuf;

    fn sample_report() -> DuplicateReport {
        DuplicateReport {
            root: PathBuf::from("/root"),
            generated_at: Utc::now(),
            groups: vec![DuplicateGroup {
                hash: ContentHash::new([0xab; 32]),
                size: 1024,
                members: vec![
                    DuplicateMember {
                        path: PathBuf::from("/root/a, copy.bin"),
                        modified_ns: 1_700_000_000_000_000_000,
                    },
                    DuplicateMember {
                        path: PathBuf::from("/root/b.bin"),
                        modified_ns: 1_700_000_000_000_000_000,
                    },
                ],
                wasted_bytes: 1024,
            }],
            suppressed: 1,
            total_wasted_bytes: 1024,
        }
    }

    #[test]
    fn test_text_report_mentions_groups_and_suppression() {
        let text = render_text(&sample_report());
        assert!(text.contains("--- Group 1 ---"));
        assert!(text.contains(&"ab".repeat(32)));
        assert!(text.contains("2 identical copies"));
        assert!(text.contains("1 acknowledged group(s) suppressed"));
    }

    #[test]
    fn test_text_report_empty_case() {
        let mut report = sample_report();
        report.groups.clear();
        let text = render_text(&report);
        assert!(text.contains("No novel duplicate groups"));
    }

    #[test]
    fn test_csv_quotes_fields_with_commas() {
        let csv = render_csv(&sample_report());
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Group ID,"));
        let first_row = lines.next().unwrap();
        assert!(first_row.contains("\"/root/a, copy.bin\""));
        // Each member row lists the other copies, not itself.
        assert!(first_row.contains("/root/b.bin"));
    }

    #[test]
    fn test_json_artifact_written_with_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json_artifact(&sample_report(), dir.path()).unwrap();
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("duplicates_"));
        assert!(name.ends_with(".json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: DuplicateReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.groups.len(), 1);
        assert_eq!(back.groups[0].hash, ContentHash::new([0xab; 32]));
    }
}
