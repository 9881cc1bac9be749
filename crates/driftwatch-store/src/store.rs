//! SQLite-backed inventory store.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use driftwatch_core::{AuditError, ContentHash, FileRecord, RecordState};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS file_records (
        path         TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        size         INTEGER NOT NULL,
        modified_ns  INTEGER NOT NULL,
        content_hash TEXT NOT NULL,
        last_seen_ns INTEGER NOT NULL,
        state        TEXT NOT NULL DEFAULT 'active',
        rot_detected INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_records_hash_size ON file_records(content_hash, size);
    CREATE INDEX IF NOT EXISTS idx_records_state ON file_records(state);
";

/// Scope limits for the end-of-run sweep.
///
/// A content-type (extension) filter keeps files outside the allow-list
/// from being hashed, but those files were still "seen" in the logical
/// sense: the sweep must not mark them missing. The same applies to
/// subtrees excluded from the walk by pattern, and to files the walk
/// observed but could not read (their prior state stays untouched).
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepScope<'a> {
    /// Extension allow-list used by the walk (empty = all files).
    pub ext_filter: &'a [String],
    /// Exclusion patterns used by the walk.
    pub exclusions: Option<&'a GlobSet>,
    /// Paths the walk observed but skipped (read errors).
    pub skipped: &'a [PathBuf],
}

impl SweepScope<'_> {
    fn covers(&self, path: &str, name: &str) -> bool {
        if let Some(exclusions) = self.exclusions
            && exclusions.is_match(path)
        {
            return false;
        }
        if self.skipped.iter().any(|p| p.as_os_str() == path) {
            return false;
        }
        if self.ext_filter.is_empty() {
            return true;
        }
        match Path::new(name).extension() {
            Some(ext) => {
                let ext = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.ext_filter.iter().any(|allowed| *allowed == ext)
            }
            None => false,
        }
    }
}

/// Per-state record counts under a prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub active: u64,
    pub missing: u64,
    pub corrupted: u64,
}

impl StateCounts {
    /// Total number of tracked records.
    pub fn total(&self) -> u64 {
        self.active + self.missing + self.corrupted
    }
}

/// Durable mapping from absolute path to [`FileRecord`].
pub struct InventoryStore {
    conn: Connection,
    db_path: PathBuf,
}

impl InventoryStore {
    /// Open (or create) the inventory database at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)
            .map_err(|e| AuditError::store(&db_path, e.to_string()))?;
        Self::init(conn, db_path)
    }

    /// Open a throwaway in-memory store. Used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, AuditError> {
        let db_path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory()
            .map_err(|e| AuditError::store(&db_path, e.to_string()))?;
        Self::init(conn, db_path)
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, AuditError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )
        .map_err(|e| AuditError::store(&db_path, format!("pragmas: {e}")))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AuditError::store(&db_path, format!("schema: {e}")))?;
        Ok(Self { conn, db_path })
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn err(&self, context: &str, e: rusqlite::Error) -> AuditError {
        AuditError::store(&self.db_path, format!("{context}: {e}"))
    }

    /// Exact-path lookup.
    pub fn get(&self, path: &Path) -> Result<Option<FileRecord>, AuditError> {
        self.conn
            .query_row(
                "SELECT path, name, size, modified_ns, content_hash, last_seen_ns, state, rot_detected
                 FROM file_records WHERE path = ?1",
                params![path_str(path)],
                row_to_record,
            )
            .optional()
            .map_err(|e| self.err("get", e))
    }

    /// All active records sharing a content hash.
    pub fn find_by_hash(&self, hash: &ContentHash) -> Result<Vec<FileRecord>, AuditError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT path, name, size, modified_ns, content_hash, last_seen_ns, state, rot_detected
                 FROM file_records WHERE content_hash = ?1 AND state = 'active'
                 ORDER BY path",
            )
            .map_err(|e| self.err("find_by_hash", e))?;
        let rows = stmt
            .query_map(params![hash.to_hex()], row_to_record)
            .map_err(|e| self.err("find_by_hash", e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.err("find_by_hash", e))
    }

    /// All records sharing a content hash, regardless of state. Feeds
    /// rename reconciliation, where the prior path may already have been
    /// swept to missing before its content resurfaces elsewhere.
    pub fn find_by_hash_any_state(
        &self,
        hash: &ContentHash,
    ) -> Result<Vec<FileRecord>, AuditError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT path, name, size, modified_ns, content_hash, last_seen_ns, state, rot_detected
                 FROM file_records WHERE content_hash = ?1
                 ORDER BY path",
            )
            .map_err(|e| self.err("find_by_hash_any_state", e))?;
        let rows = stmt
            .query_map(params![hash.to_hex()], row_to_record)
            .map_err(|e| self.err("find_by_hash_any_state", e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.err("find_by_hash_any_state", e))
    }

    /// Insert-or-replace keyed by path.
    pub fn upsert(&mut self, record: &FileRecord) -> Result<(), AuditError> {
        self.conn
            .execute(
                "INSERT INTO file_records
                     (path, name, size, modified_ns, content_hash, last_seen_ns, state, rot_detected)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(path) DO UPDATE SET
                     name = excluded.name,
                     size = excluded.size,
                     modified_ns = excluded.modified_ns,
                     content_hash = excluded.content_hash,
                     last_seen_ns = excluded.last_seen_ns,
                     state = excluded.state,
                     rot_detected = excluded.rot_detected",
                params![
                    path_str(&record.path),
                    record.name.as_str(),
                    record.size as i64,
                    record.modified_ns,
                    record.content_hash.to_hex(),
                    record.last_seen_ns,
                    record.state.to_string(),
                    record.rot_detected,
                ],
            )
            .map_err(|e| self.err("upsert", e))?;
        Ok(())
    }

    /// Fast-path update for a metadata-unchanged file: advance `last_seen_ns`
    /// without touching the digest. A missing record that reappears goes back
    /// to active; a corrupted record stays corrupted, since re-observing the
    /// same corrupt content is not a recovery. Only a genuine modification
    /// clears a corruption finding.
    pub fn touch_seen(&mut self, path: &Path, seen_ns: i64) -> Result<(), AuditError> {
        self.conn
            .execute(
                "UPDATE file_records
                 SET last_seen_ns = MAX(last_seen_ns, ?2),
                     state = CASE WHEN state = 'corrupted' THEN state ELSE 'active' END
                 WHERE path = ?1",
                params![path_str(path), seen_ns],
            )
            .map_err(|e| self.err("touch_seen", e))?;
        Ok(())
    }

    /// Rename reconciliation: move a record's identity to a new path,
    /// keeping its content hash and size lineage. A missing record whose
    /// content resurfaced goes back to active; a corrupted record carries
    /// its finding with it.
    pub fn reassign_path(
        &mut self,
        old_path: &Path,
        new_path: &Path,
        modified_ns: i64,
        seen_ns: i64,
    ) -> Result<(), AuditError> {
        let name = new_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| new_path.to_string_lossy().to_string());
        self.conn
            .execute(
                "UPDATE file_records
                 SET path = ?2, name = ?3, modified_ns = ?4, last_seen_ns = ?5,
                     state = CASE WHEN state = 'corrupted' THEN state ELSE 'active' END
                 WHERE path = ?1",
                params![path_str(old_path), path_str(new_path), name, modified_ns, seen_ns],
            )
            .map_err(|e| self.err("reassign_path", e))?;
        Ok(())
    }

    /// Mark active records under `root_prefix` that predate `scan_started_ns`
    /// as missing. Runs in one transaction so readers never observe a
    /// partially applied sweep. Returns the number of records transitioned.
    pub fn sweep_missing(
        &mut self,
        root_prefix: &Path,
        scan_started_ns: i64,
        scope: SweepScope<'_>,
    ) -> Result<usize, AuditError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| AuditError::store(&self.db_path, format!("sweep begin: {e}")))?;

        let stale: Vec<(String, String)> = {
            let mut stmt = tx
                .prepare(
                    "SELECT path, name FROM file_records
                     WHERE path LIKE ?1 ESCAPE '\\'
                       AND state = 'active'
                       AND last_seen_ns < ?2",
                )
                .map_err(|e| AuditError::store(&self.db_path, format!("sweep select: {e}")))?;
            let rows = stmt
                .query_map(params![like_prefix(root_prefix), scan_started_ns], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| AuditError::store(&self.db_path, format!("sweep select: {e}")))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| AuditError::store(&self.db_path, format!("sweep select: {e}")))?
        };

        let mut swept = 0usize;
        for (path, name) in &stale {
            if !scope.covers(path, name) {
                debug!(path, "outside sweep scope, left active");
                continue;
            }
            tx.execute(
                "UPDATE file_records SET state = 'missing' WHERE path = ?1",
                params![path],
            )
            .map_err(|e| AuditError::store(&self.db_path, format!("sweep update: {e}")))?;
            swept += 1;
        }

        tx.commit()
            .map_err(|e| AuditError::store(&self.db_path, format!("sweep commit: {e}")))?;
        Ok(swept)
    }

    /// All active records under a prefix, ordered by path. Feeds the
    /// duplicate resolver.
    pub fn active_records(&self, root_prefix: &Path) -> Result<Vec<FileRecord>, AuditError> {
        self.records_in_state(root_prefix, RecordState::Active)
    }

    /// All records in a given state under a prefix, ordered by path.
    pub fn records_in_state(
        &self,
        root_prefix: &Path,
        state: RecordState,
    ) -> Result<Vec<FileRecord>, AuditError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT path, name, size, modified_ns, content_hash, last_seen_ns, state, rot_detected
                 FROM file_records
                 WHERE path LIKE ?1 ESCAPE '\\' AND state = ?2
                 ORDER BY path",
            )
            .map_err(|e| self.err("records_in_state", e))?;
        let rows = stmt
            .query_map(params![like_prefix(root_prefix), state.to_string()], row_to_record)
            .map_err(|e| self.err("records_in_state", e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.err("records_in_state", e))
    }

    /// Per-state counts under a prefix.
    pub fn state_counts(&self, root_prefix: &Path) -> Result<StateCounts, AuditError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT state, COUNT(*) FROM file_records
                 WHERE path LIKE ?1 ESCAPE '\\' GROUP BY state",
            )
            .map_err(|e| self.err("state_counts", e))?;
        let rows = stmt
            .query_map(params![like_prefix(root_prefix)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| self.err("state_counts", e))?;

        let mut counts = StateCounts::default();
        for row in rows {
            let (state, count) = row.map_err(|e| self.err("state_counts", e))?;
            let count = count.max(0) as u64;
            match state.as_str() {
                "active" => counts.active = count,
                "missing" => counts.missing = count,
                "corrupted" => counts.corrupted = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// Delete records in a given state under a prefix. The auditor never
    /// calls this; it is the explicit operator prune. Returns the number
    /// of records deleted.
    pub fn prune(&mut self, root_prefix: &Path, state: RecordState) -> Result<usize, AuditError> {
        self.conn
            .execute(
                "DELETE FROM file_records
                 WHERE path LIKE ?1 ESCAPE '\\' AND state = ?2",
                params![like_prefix(root_prefix), state.to_string()],
            )
            .map_err(|e| self.err("prune", e))
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Build a LIKE pattern matching every path under a prefix, escaping
/// LIKE metacharacters in the prefix itself.
fn like_prefix(prefix: &Path) -> String {
    let mut escaped = String::new();
    for c in prefix.to_string_lossy().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let path: String = row.get(0)?;
    let name: String = row.get(1)?;
    let size: i64 = row.get(2)?;
    let modified_ns: i64 = row.get(3)?;
    let hash_hex: String = row.get(4)?;
    let last_seen_ns: i64 = row.get(5)?;
    let state: String = row.get(6)?;
    let rot_detected: bool = row.get(7)?;

    let content_hash = ContentHash::from_hex(&hash_hex)
        .ok_or_else(|| column_error(4, format!("bad content_hash {hash_hex:?}")))?;
    let state: RecordState = state
        .parse()
        .map_err(|_| column_error(6, format!("bad state {state:?}")))?;

    Ok(FileRecord {
        path: PathBuf::from(path),
        name: name.into(),
        size: size.max(0) as u64,
        modified_ns,
        content_hash,
        last_seen_ns,
        state,
        rot_detected,
    })
}

fn column_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}
