//! Duplicate grouping over the inventory.
//!
//! The resolver never touches the filesystem: it groups the store's
//! active records by content hash, drops groups the user has already
//! acknowledged, and emits the residual novel groups. Suppression is
//! exact set equality on member paths; a known group that is a strict
//! subset of a larger current group is NOT suppressed, because the
//! extra member is a new genuine duplicate.
//!
//! ```rust,no_run
//! use driftwatch_dedupe::{DuplicateResolver, KnownDuplicates};
//! use driftwatch_store::InventoryStore;
//! use std::path::Path;
//!
//! let store = InventoryStore::open("/mnt/backup/inventory.db").unwrap();
//! let known = KnownDuplicates::from_json_file("known_dupes.json").unwrap();
//! let report = DuplicateResolver::with_known(known)
//!     .resolve(&store, Path::new("/mnt/backup"))
//!     .unwrap();
//!
//! println!("{} novel duplicate groups", report.groups.len());
//! ```

mod report;
mod resolver;

pub use report::{render_csv, render_text, write_json_artifact};
pub use resolver::{
    DuplicateGroup, DuplicateMember, DuplicateReport, DuplicateResolver, KnownDuplicates,
    KnownGroup,
};

// Re-export core types for convenience
pub use driftwatch_core::{AuditError, ContentHash, FileRecord};
