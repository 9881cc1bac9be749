//! Duplicate group resolution with acknowledgement suppression.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use driftwatch_core::{AuditError, ContentHash, ns_to_system_time};
use driftwatch_store::InventoryStore;

/// One user-acknowledged duplicate group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownGroup {
    /// Digest recorded at acknowledgement time. Informational: matching
    /// is on the path set, so a group stays acknowledged even if the
    /// files were re-encoded in place.
    #[serde(default)]
    pub hash: Option<String>,
    /// Member paths the user chose to keep.
    pub files: BTreeSet<PathBuf>,
}

/// Groups the user has acknowledged and wants suppressed from reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownDuplicates {
    groups: Vec<KnownGroup>,
}

impl KnownDuplicates {
    /// Load from the JSON format emitted at acknowledgement time:
    /// `[{"hash": "...", "files": ["/a", "/b"]}, ...]`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| AuditError::config(format!("{}: {e}", path.display())))
    }

    /// Number of acknowledged groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// True when no groups are acknowledged.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Exact set equality against any acknowledged group.
    pub fn is_acknowledged(&self, members: &BTreeSet<PathBuf>) -> bool {
        self.groups.iter().any(|known| known.files == *members)
    }
}

/// One member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMember {
    /// Path of the copy.
    pub path: PathBuf,
    /// Modification time, nanoseconds since the Unix epoch.
    pub modified_ns: i64,
}

impl DuplicateMember {
    /// Modification time as a UTC datetime for display.
    pub fn modified_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(ns_to_system_time(self.modified_ns))
    }
}

/// A group of paths sharing one content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content hash shared by all members.
    pub hash: ContentHash,
    /// Size of each copy in bytes.
    pub size: u64,
    /// Member paths with their modification times, ordered by path.
    pub members: Vec<DuplicateMember>,
    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    /// Number of identical copies.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Member paths as a set, for acknowledgement comparison.
    pub fn path_set(&self) -> BTreeSet<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }
}

/// Results from duplicate resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Root prefix the resolution was scoped to.
    pub root: PathBuf,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Novel duplicate groups, sorted by wasted space descending.
    pub groups: Vec<DuplicateGroup>,
    /// Groups suppressed by exact acknowledgement match.
    pub suppressed: usize,
    /// Total reclaimable bytes across novel groups.
    pub total_wasted_bytes: u64,
}

impl DuplicateReport {
    /// True when any novel duplicate groups were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of redundant copies across all novel groups (one copy per
    /// group is considered the keeper).
    pub fn redundant_files(&self) -> usize {
        self.groups.iter().map(|g| g.count().saturating_sub(1)).sum()
    }
}

/// Groups active inventory records by hash and filters acknowledged sets.
#[derive(Debug, Default)]
pub struct DuplicateResolver {
    known: KnownDuplicates,
}

impl DuplicateResolver {
    /// Resolver with no acknowledged groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that suppresses the given acknowledged groups.
    pub fn with_known(known: KnownDuplicates) -> Self {
        Self { known }
    }

    /// Resolve duplicate groups among active records under a root prefix.
    pub fn resolve(
        &self,
        store: &InventoryStore,
        root: &Path,
    ) -> Result<DuplicateReport, AuditError> {
        let records = store.active_records(root)?;

        let mut by_hash: HashMap<ContentHash, Vec<DuplicateMember>> = HashMap::new();
        let mut size_for_hash: HashMap<ContentHash, u64> = HashMap::new();
        for record in records {
            size_for_hash.entry(record.content_hash).or_insert(record.size);
            by_hash
                .entry(record.content_hash)
                .or_default()
                .push(DuplicateMember {
                    path: record.path,
                    modified_ns: record.modified_ns,
                });
        }

        let mut groups = Vec::new();
        let mut suppressed = 0usize;
        for (hash, mut members) in by_hash {
            if members.len() < 2 {
                continue;
            }
            members.sort_by(|a, b| a.path.cmp(&b.path));

            let path_set: BTreeSet<PathBuf> = members.iter().map(|m| m.path.clone()).collect();
            if self.known.is_acknowledged(&path_set) {
                debug!(hash = %hash.to_hex(), "group acknowledged, suppressed");
                suppressed += 1;
                continue;
            }

            let size = size_for_hash.get(&hash).copied().unwrap_or(0);
            let wasted_bytes = size * (members.len() as u64 - 1);
            groups.push(DuplicateGroup {
                hash,
                size,
                members,
                wasted_bytes,
            });
        }

        groups.sort_by(|a, b| {
            b.wasted_bytes
                .cmp(&a.wasted_bytes)
                .then_with(|| a.hash.to_hex().cmp(&b.hash.to_hex()))
        });
        let total_wasted_bytes = groups.iter().map(|g| g.wasted_bytes).sum();

        Ok(DuplicateReport {
            root: root.to_path_buf(),
            generated_at: Utc::now(),
            groups,
            suppressed,
            total_wasted_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwatch_core::FileRecord;

    fn seed(store: &mut InventoryStore, path: &str, size: u64, hash_byte: u8) {
        let record = FileRecord::new_active(path, size, 1_000, ContentHash::new([hash_byte; 32]), 100);
        store.upsert(&record).unwrap();
    }

    #[test]
    fn test_groups_by_hash_min_two_members() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        seed(&mut store, "/root/file1", 10, 0x11);
        seed(&mut store, "/root/file2", 20, 0x22);
        seed(&mut store, "/root/file3", 10, 0x11);

        let report = DuplicateResolver::new()
            .resolve(&store, Path::new("/root"))
            .unwrap();

        // Files 1 and 3 share a hash at size 10; file 2 stays out.
        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.size, 10);
        assert_eq!(
            group.path_set(),
            BTreeSet::from([PathBuf::from("/root/file1"), PathBuf::from("/root/file3")])
        );
        assert_eq!(group.wasted_bytes, 10);
        assert_eq!(report.redundant_files(), 1);
    }

    #[test]
    fn test_exact_acknowledgement_suppresses() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        seed(&mut store, "/root/a", 10, 0x11);
        seed(&mut store, "/root/b", 10, 0x11);

        let known: KnownDuplicates = serde_json::from_str(
            r#"[{"hash": "ignored", "files": ["/root/a", "/root/b"]}]"#,
        )
        .unwrap();

        let report = DuplicateResolver::with_known(known)
            .resolve(&store, Path::new("/root"))
            .unwrap();
        assert!(report.groups.is_empty());
        assert_eq!(report.suppressed, 1);
    }

    #[test]
    fn test_strict_subset_is_not_suppressed() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        seed(&mut store, "/root/a", 10, 0x11);
        seed(&mut store, "/root/b", 10, 0x11);
        seed(&mut store, "/root/c", 10, 0x11);

        // {a, b} was acknowledged, but a new copy c appeared: the group
        // {a, b, c} must be emitted, not silently hidden.
        let known: KnownDuplicates =
            serde_json::from_str(r#"[{"files": ["/root/a", "/root/b"]}]"#).unwrap();

        let report = DuplicateResolver::with_known(known)
            .resolve(&store, Path::new("/root"))
            .unwrap();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].count(), 3);
        assert_eq!(report.suppressed, 0);
    }

    #[test]
    fn test_missing_records_do_not_join_groups() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        seed(&mut store, "/root/a", 10, 0x11);
        let mut gone =
            FileRecord::new_active("/root/b", 10, 1_000, ContentHash::new([0x11; 32]), 100);
        gone.state = driftwatch_core::RecordState::Missing;
        store.upsert(&gone).unwrap();

        let report = DuplicateResolver::new()
            .resolve(&store, Path::new("/root"))
            .unwrap();
        assert!(!report.has_duplicates());
    }

    #[test]
    fn test_groups_sorted_by_wasted_space() {
        let mut store = InventoryStore::open_in_memory().unwrap();
        seed(&mut store, "/root/small1", 10, 0x11);
        seed(&mut store, "/root/small2", 10, 0x11);
        seed(&mut store, "/root/big1", 1_000, 0x22);
        seed(&mut store, "/root/big2", 1_000, 0x22);

        let report = DuplicateResolver::new()
            .resolve(&store, Path::new("/root"))
            .unwrap();
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].size, 1_000);
        assert_eq!(report.total_wasted_bytes, 1_010);
    }

    #[test]
    fn test_known_duplicates_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known.json");
        std::fs::write(&path, r#"[{"hash": "ab", "files": ["/x", "/y"]}]"#).unwrap();

        let known = KnownDuplicates::from_json_file(&path).unwrap();
        assert_eq!(known.len(), 1);
        assert!(known.is_acknowledged(&BTreeSet::from([PathBuf::from("/x"), PathBuf::from("/y")])));
        assert!(!known.is_acknowledged(&BTreeSet::from([PathBuf::from("/x")])));
    }
}
