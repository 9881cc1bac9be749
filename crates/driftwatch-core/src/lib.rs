//! Core types for driftwatch.
//!
//! This crate provides the fundamental data structures shared across
//! the driftwatch workspace: file records, lifecycle states, audit
//! configuration, and the error taxonomy.
//!
//! # Constraint
//!
//! Record identity is the absolute `path`. The auditor assumes mount
//! points are stable across runs; remounting a root under a different
//! path is a full re-inventory, not something the core reconciles.
//! Two concurrent audit runs against the same store are unsupported
//! and may race on the sweep boundary.

mod config;
mod error;
mod record;

pub use config::{AuditConfig, AuditConfigBuilder, DEFAULT_HASH_CHUNK_SIZE};
pub use error::{AuditError, AuditWarning, WarningKind};
pub use record::{ContentHash, FileRecord, RecordState, ns_to_system_time, system_time_to_ns};
