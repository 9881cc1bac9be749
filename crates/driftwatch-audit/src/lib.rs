//! Change classification and scan orchestration for driftwatch.
//!
//! The [`Auditor`] walks a root directory in deterministic order,
//! classifies every regular file against the inventory without hashing
//! unless necessary, routes entries that need a digest through the
//! hashing engine, and finishes with the missing-file sweep.
//!
//! # Example
//!
//! ```rust,no_run
//! use driftwatch_audit::Auditor;
//! use driftwatch_core::AuditConfig;
//! use driftwatch_store::InventoryStore;
//!
//! let config = AuditConfig::new("/mnt/backup/photos");
//! let mut store = InventoryStore::open("/mnt/backup/inventory.db").unwrap();
//! let report = Auditor::new(config).unwrap().run(&mut store).unwrap();
//!
//! println!("{} new, {} modified, {} corrupted",
//!     report.stats.new_files, report.stats.modified, report.stats.corrupted);
//! ```
//!
//! # Progress monitoring
//!
//! Subscribe to periodic progress snapshots during a run:
//!
//! ```rust,no_run
//! use driftwatch_audit::Auditor;
//! use driftwatch_core::AuditConfig;
//!
//! let auditor = Auditor::new(AuditConfig::new("/mnt/backup")).unwrap();
//! let mut progress_rx = auditor.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("scanned {} files", progress.files_scanned);
//!     }
//! });
//! ```

mod auditor;
mod classify;
mod extensions;
mod progress;

pub use auditor::{AuditReport, AuditStats, Auditor, CancelFlag, RunPhase};
pub use classify::{Classification, VerifyCadence, classify, find_rename_candidate};
pub use extensions::{ExtensionReport, survey_extensions};
pub use progress::AuditProgress;

// Re-export core types for convenience
pub use driftwatch_core::{AuditConfig, AuditError, AuditWarning, FileRecord, RecordState};
