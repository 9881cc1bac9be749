//! Durable inventory store for driftwatch.
//!
//! One SQLite database holds one `file_records` row per tracked path.
//! The store is the only source of truth across runs: every mutation
//! commits before the call returns, so an interrupted walk leaves a
//! valid (if partial) inventory behind.
//!
//! Writes are serialized through a single `InventoryStore` handle.
//! Two concurrent audit runs against the same database are unsupported.

mod store;

pub use store::{InventoryStore, StateCounts, SweepScope};

// Re-export core types for convenience
pub use driftwatch_core::{AuditError, ContentHash, FileRecord, RecordState};
