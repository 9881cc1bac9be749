//! Scan orchestrator.
//!
//! Drives one audit run through `Idle -> Walking -> Sweeping -> Done`.
//! Per-file failures never abort the walk; only store unavailability is
//! fatal. The sweep runs only after a fully completed walk, so an
//! interrupted or cancelled run can never mark still-present files
//! missing. Partial progress survives either way because every upsert
//! is an independently durable, self-consistent record.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use driftwatch_core::{
    AuditConfig, AuditError, AuditWarning, FileRecord, RecordState, system_time_to_ns,
};
use driftwatch_store::{InventoryStore, SweepScope};

use crate::classify::{Classification, VerifyCadence, classify, find_rename_candidate};
use crate::progress::AuditProgress;

const PROGRESS_INTERVAL: u64 = 1000;

/// Phase the run ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Run constructed, not started.
    Idle,
    /// Walking the directory tree.
    Walking,
    /// Applying the missing-file sweep.
    Sweeping,
    /// Walk and sweep both completed.
    Done,
    /// Cancelled between files; sweep skipped.
    Interrupted,
}

/// Counters for one audit run, mirrored in the run summary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AuditStats {
    /// Regular files classified.
    pub scanned: u64,
    /// Fast-path files: metadata unchanged, no hash.
    pub unchanged: u64,
    /// Metadata-unchanged files that got a verification hash (clean).
    pub verified: u64,
    /// Newly inventoried files.
    pub new_files: u64,
    /// Files re-hashed after a size/mtime change.
    pub modified: u64,
    /// Files reconciled as renames of a vanished path.
    pub moved: u64,
    /// Bit-rot findings: digest changed under unchanged metadata.
    pub corrupted: u64,
    /// Records swept to missing at end of run.
    pub swept: u64,
    /// Files routed through the hashing engine this run.
    pub hashed: u64,
    /// Files observed but skipped on read/metadata errors.
    pub skipped: u64,
    /// Entries dropped by exclusion patterns or the extension filter.
    pub filtered: u64,
}

/// Result of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Canonical root that was walked.
    pub root: PathBuf,
    /// Scan-start boundary (nanoseconds since the Unix epoch), recorded
    /// before the first entry was processed.
    pub scan_started_ns: i64,
    /// Wall time of the run.
    pub duration: Duration,
    /// Phase the run ended in.
    pub phase: RunPhase,
    /// Counters.
    pub stats: AuditStats,
    /// Recovered warnings (read errors, skipped subtrees).
    pub warnings: Vec<AuditWarning>,
    /// Paths flagged corrupted during this run. Reported loudly and
    /// separately from ordinary counts.
    pub corrupted_paths: Vec<PathBuf>,
}

impl AuditReport {
    /// True when the run flagged at least one bit-rot finding.
    pub fn has_corruption(&self) -> bool {
        !self.corrupted_paths.is_empty()
    }
}

/// Cloneable cancellation flag; cancelling stops the walk between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Orchestrates one audit run over a root directory.
pub struct Auditor {
    config: AuditConfig,
    exclusions: globset::GlobSet,
    progress_tx: broadcast::Sender<AuditProgress>,
    cancel: CancelFlag,
}

impl Auditor {
    /// Create an auditor for the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let exclusions = config.exclusion_matcher()?;
        let (progress_tx, _) = broadcast::channel(100);
        Ok(Self {
            config,
            exclusions,
            progress_tx,
            cancel: CancelFlag::default(),
        })
    }

    /// Subscribe to progress snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditProgress> {
        self.progress_tx.subscribe()
    }

    /// Get a handle that cancels the run between files.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the audit: walk, classify, hash where needed, then sweep.
    pub fn run(&self, store: &mut InventoryStore) -> Result<AuditReport, AuditError> {
        let started = Instant::now();
        let root = self
            .config
            .root
            .canonicalize()
            .map_err(|e| AuditError::io(&self.config.root, e))?;
        if !root.is_dir() {
            return Err(AuditError::NotADirectory { path: root });
        }

        // Scan-start boundary: anything touched during the walk carries
        // this timestamp or later and can never be swept by it.
        let scan_started_ns = system_time_to_ns(SystemTime::now());
        info!(root = %root.display(), scan_started_ns, "audit walk starting");

        let mut phase = RunPhase::Walking;
        let mut stats = AuditStats::default();
        let mut warnings = Vec::new();
        let mut corrupted_paths = Vec::new();
        let mut skipped_paths = Vec::new();
        let mut cadence = VerifyCadence::new(self.config.force_verify, self.config.verify_every);
        let mut hashed_bytes = 0u64;

        let walker = jwalk::WalkDir::new(&root)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(jwalk::Parallelism::Serial);

        'walk: for entry_result in walker {
            if self.cancel.is_cancelled() {
                phase = RunPhase::Interrupted;
                warn!("cancellation requested, stopping walk; sweep skipped");
                break 'walk;
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    warn!(path = %path.display(), %err, "subtree skipped");
                    warnings.push(AuditWarning::enumeration(path, err.to_string()));
                    continue;
                }
            };

            // Symlinks and special files are skipped, not errored.
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if self.exclusions.is_match(&path) || !self.config.matches_extension(&name) {
                stats.filtered += 1;
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    stats.skipped += 1;
                    skipped_paths.push(path.clone());
                    warnings.push(AuditWarning::metadata(&path, err.to_string()));
                    continue;
                }
            };

            let size = metadata.len();
            let modified_ns = system_time_to_ns(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH));
            stats.scanned += 1;

            let existing = store.get(&path)?;
            match classify(size, modified_ns, existing.as_ref(), &mut cadence) {
                Classification::Unchanged { verify: false } => {
                    store.touch_seen(&path, scan_started_ns)?;
                    stats.unchanged += 1;
                }
                Classification::Unchanged { verify: true } => {
                    // Unchanged implies a record exists.
                    let Some(record) = existing.as_ref() else {
                        continue;
                    };
                    match driftwatch_hash::hash_file(&path, self.config.hash_chunk_size) {
                        Ok(digest) => {
                            stats.hashed += 1;
                            hashed_bytes += size;
                            if digest == record.content_hash {
                                store.touch_seen(&path, scan_started_ns)?;
                                stats.unchanged += 1;
                                stats.verified += 1;
                            } else {
                                // Metadata claims nothing changed while the
                                // content did: bit-rot, not an edit.
                                let mut rotted = record.clone();
                                rotted.content_hash = digest;
                                rotted.state = RecordState::Corrupted;
                                rotted.rot_detected = true;
                                rotted.last_seen_ns = scan_started_ns;
                                store.upsert(&rotted)?;
                                stats.corrupted += 1;
                                error!(
                                    path = %path.display(),
                                    old_hash = %record.content_hash.to_hex(),
                                    new_hash = %digest.to_hex(),
                                    "BIT-ROT DETECTED: digest changed under unchanged size/mtime"
                                );
                                corrupted_paths.push(path.clone());
                            }
                        }
                        Err(err) => {
                            stats.skipped += 1;
                            skipped_paths.push(path.clone());
                            warnings.push(AuditWarning::read_error(&path, &err));
                        }
                    }
                }
                Classification::Modified => {
                    match driftwatch_hash::hash_file(&path, self.config.hash_chunk_size) {
                        Ok(digest) => {
                            stats.hashed += 1;
                            hashed_bytes += size;
                            // A genuine edit clears any standing rot marker.
                            let record = FileRecord::new_active(
                                &path,
                                size,
                                modified_ns,
                                digest,
                                scan_started_ns,
                            );
                            store.upsert(&record)?;
                            stats.modified += 1;
                            debug!(path = %path.display(), "modified, record updated");
                        }
                        Err(err) => {
                            stats.skipped += 1;
                            skipped_paths.push(path.clone());
                            warnings.push(AuditWarning::read_error(&path, &err));
                        }
                    }
                }
                Classification::New => {
                    match driftwatch_hash::hash_file(&path, self.config.hash_chunk_size) {
                        Ok(digest) => {
                            stats.hashed += 1;
                            hashed_bytes += size;
                            match find_rename_candidate(store, &digest, size, &path)? {
                                Some(prior) => {
                                    store.reassign_path(
                                        &prior.path,
                                        &path,
                                        modified_ns,
                                        scan_started_ns,
                                    )?;
                                    stats.moved += 1;
                                    debug!(
                                        from = %prior.path.display(),
                                        to = %path.display(),
                                        "rename reconciled"
                                    );
                                }
                                None => {
                                    let record = FileRecord::new_active(
                                        &path,
                                        size,
                                        modified_ns,
                                        digest,
                                        scan_started_ns,
                                    );
                                    store.upsert(&record)?;
                                    stats.new_files += 1;
                                }
                            }
                        }
                        Err(err) => {
                            stats.skipped += 1;
                            skipped_paths.push(path.clone());
                            warnings.push(AuditWarning::read_error(&path, &err));
                        }
                    }
                }
            }

            if stats.scanned % PROGRESS_INTERVAL == 0 {
                let _ = self.progress_tx.send(AuditProgress {
                    files_scanned: stats.scanned,
                    files_hashed: stats.hashed,
                    bytes_hashed: hashed_bytes,
                    current_path: path,
                    warnings_count: warnings.len() as u64,
                    elapsed: started.elapsed(),
                });
            }
        }

        if phase == RunPhase::Walking {
            // Walk completed fully: commit the sweep. An interrupted walk
            // skips it entirely so unvisited files are never marked missing.
            phase = RunPhase::Sweeping;
            let scope = SweepScope {
                ext_filter: &self.config.ext_filter,
                exclusions: Some(&self.exclusions),
                skipped: &skipped_paths,
            };
            stats.swept = store.sweep_missing(&root, scan_started_ns, scope)? as u64;
            phase = RunPhase::Done;
            info!(swept = stats.swept, "sweep complete");
        }

        info!(
            scanned = stats.scanned,
            unchanged = stats.unchanged,
            new = stats.new_files,
            modified = stats.modified,
            moved = stats.moved,
            corrupted = stats.corrupted,
            skipped = stats.skipped,
            "audit run finished"
        );

        Ok(AuditReport {
            root,
            scan_started_ns,
            duration: started.elapsed(),
            phase,
            stats,
            warnings,
            corrupted_paths,
        })
    }
}
