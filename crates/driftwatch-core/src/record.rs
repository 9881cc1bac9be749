//! File record and lifecycle state types.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// BLAKE3 content digest of a file.
///
/// Serializes as the 64-character hex string used by the store and by
/// report artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid content hash {hex:?}")))
    }
}

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string back into a hash.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

/// Lifecycle state of a tracked file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Observed in the most recent scan of its root.
    Active,
    /// Previously active, not observed by the last completed sweep.
    Missing,
    /// Content digest changed while size and mtime did not (bit-rot).
    Corrupted,
}

/// One row of the inventory: everything known about a tracked path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path; unique identity key within the store.
    pub path: PathBuf,

    /// Final path segment, kept for extension and grouping queries.
    pub name: CompactString,

    /// Byte length at last observation.
    pub size: u64,

    /// Filesystem mtime at last observation, nanoseconds since the Unix epoch.
    pub modified_ns: i64,

    /// Digest of file content at the last successful hash.
    pub content_hash: ContentHash,

    /// Timestamp of the most recent scan that observed this path.
    pub last_seen_ns: i64,

    /// Lifecycle state.
    pub state: RecordState,

    /// Set when the digest diverged from its trusted value at unchanged
    /// size/mtime. Cleared again by a genuine modification.
    pub rot_detected: bool,
}

impl FileRecord {
    /// Create a fresh active record for a newly observed path.
    pub fn new_active(
        path: impl Into<PathBuf>,
        size: u64,
        modified_ns: i64,
        content_hash: ContentHash,
        seen_ns: i64,
    ) -> Self {
        let path = path.into();
        let name = file_name_of(&path);
        Self {
            path,
            name,
            size,
            modified_ns,
            content_hash,
            last_seen_ns: seen_ns,
            state: RecordState::Active,
            rot_detected: false,
        }
    }

    /// True when the observed metadata matches what the record last saw.
    pub fn matches_metadata(&self, size: u64, modified_ns: i64) -> bool {
        self.size == size && self.modified_ns == modified_ns
    }

    /// Modification time as a `SystemTime`.
    pub fn modified_at(&self) -> SystemTime {
        ns_to_system_time(self.modified_ns)
    }

    /// Lowercased extension including the leading dot, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.name.as_str())
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
    }
}

/// Extract the final path segment as the record name.
pub(crate) fn file_name_of(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

/// Convert a `SystemTime` to integer nanoseconds since the Unix epoch.
///
/// Times before the epoch clamp to zero; filesystems that produce them
/// are not worth distinguishing for change detection.
pub fn system_time_to_ns(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Convert integer nanoseconds since the Unix epoch back to `SystemTime`.
pub fn ns_to_system_time(ns: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(ns.max(0) as u64)
}
