//! Three-way change classification.
//!
//! Metadata-only comparison is what makes repeated large-scale scans
//! tractable: a file whose size and mtime both match its record is not
//! re-hashed on the fast path. The verification cadence forces a digest
//! check on a sample of those files anyway, which is the only way
//! same-size/same-mtime corruption is ever caught.

use std::path::Path;

use driftwatch_core::{AuditError, ContentHash, FileRecord};
use driftwatch_store::InventoryStore;

/// Outcome of classifying one filesystem entry against the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No record exists for this path. The entry must be hashed; the
    /// digest may still reconcile it as a rename (see
    /// [`find_rename_candidate`]).
    New,
    /// Size and mtime match the record. `verify` is set when the
    /// cadence demands a digest check despite unchanged metadata.
    Unchanged { verify: bool },
    /// Size or mtime differs: assumed intentional edit, re-hash.
    Modified,
}

/// Verification sampling state across one run.
///
/// `force` hashes everything; otherwise every `every`-th
/// metadata-unchanged file gets a digest check (0 disables sampling).
#[derive(Debug, Clone)]
pub struct VerifyCadence {
    force: bool,
    every: u64,
    unchanged_seen: u64,
}

impl VerifyCadence {
    /// Create a cadence from config values.
    pub fn new(force: bool, every: u64) -> Self {
        Self {
            force,
            every,
            unchanged_seen: 0,
        }
    }

    /// Decide whether the next metadata-unchanged file gets verified.
    pub fn should_verify(&mut self) -> bool {
        if self.force {
            return true;
        }
        if self.every == 0 {
            return false;
        }
        self.unchanged_seen += 1;
        self.unchanged_seen % self.every == 0
    }
}

/// Classify one entry's observed metadata against its record, if any.
pub fn classify(
    size: u64,
    modified_ns: i64,
    existing: Option<&FileRecord>,
    cadence: &mut VerifyCadence,
) -> Classification {
    match existing {
        None => Classification::New,
        Some(record) if record.matches_metadata(size, modified_ns) => Classification::Unchanged {
            verify: cadence.should_verify(),
        },
        Some(_) => Classification::Modified,
    }
}

/// After hashing a `New` entry, look for a record this file was renamed
/// from: same digest, same size, different path, and the old path no
/// longer present on disk. Candidates include records already swept to
/// missing, so content that resurfaces at a new path reclaims its old
/// record instead of leaving a permanent missing row behind. Resolved
/// via store query, never via in-memory back-references.
pub fn find_rename_candidate(
    store: &InventoryStore,
    hash: &ContentHash,
    size: u64,
    new_path: &Path,
) -> Result<Option<FileRecord>, AuditError> {
    let candidates = store.find_by_hash_any_state(hash)?;
    Ok(candidates.into_iter().find(|record| {
        record.size == size && record.path != new_path && !record.path.exists()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftwatch_core::ContentHash;

    fn record(size: u64, modified_ns: i64) -> FileRecord {
        FileRecord::new_active("/root/a.bin", size, modified_ns, ContentHash::new([1; 32]), 0)
    }

    #[test]
    fn test_no_record_is_new() {
        let mut cadence = VerifyCadence::new(false, 0);
        assert_eq!(classify(10, 100, None, &mut cadence), Classification::New);
    }

    #[test]
    fn test_matching_metadata_is_unchanged_without_verification() {
        let rec = record(10, 100);
        let mut cadence = VerifyCadence::new(false, 0);
        assert_eq!(
            classify(10, 100, Some(&rec), &mut cadence),
            Classification::Unchanged { verify: false }
        );
    }

    #[test]
    fn test_size_or_mtime_change_is_modified() {
        let rec = record(10, 100);
        let mut cadence = VerifyCadence::new(false, 0);
        assert_eq!(classify(11, 100, Some(&rec), &mut cadence), Classification::Modified);
        assert_eq!(classify(10, 101, Some(&rec), &mut cadence), Classification::Modified);
    }

    #[test]
    fn test_force_verify_hashes_every_unchanged_file() {
        let rec = record(10, 100);
        let mut cadence = VerifyCadence::new(true, 0);
        for _ in 0..3 {
            assert_eq!(
                classify(10, 100, Some(&rec), &mut cadence),
                Classification::Unchanged { verify: true }
            );
        }
    }

    #[test]
    fn test_sampling_cadence_hits_every_nth_unchanged_file() {
        let rec = record(10, 100);
        let mut cadence = VerifyCadence::new(false, 3);

        let verified: Vec<bool> = (0..9)
            .map(|_| match classify(10, 100, Some(&rec), &mut cadence) {
                Classification::Unchanged { verify } => verify,
                other => panic!("unexpected classification {other:?}"),
            })
            .collect();

        assert_eq!(verified, vec![false, false, true, false, false, true, false, false, true]);
    }

    #[test]
    fn test_cadence_counts_only_unchanged_files() {
        let rec = record(10, 100);
        let mut cadence = VerifyCadence::new(false, 2);

        assert_eq!(classify(10, 100, Some(&rec), &mut cadence), Classification::Unchanged { verify: false });
        // Modified and new entries must not advance the sampling counter.
        assert_eq!(classify(11, 100, Some(&rec), &mut cadence), Classification::Modified);
        assert_eq!(classify(10, 100, None, &mut cadence), Classification::New);
        assert_eq!(classify(10, 100, Some(&rec), &mut cadence), Classification::Unchanged { verify: true });
    }
}
