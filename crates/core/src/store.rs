// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed local store for records and queued operations.
//!
//! The [`LocalStore`] is the only component that performs persistence I/O.
//! Every mutating call commits before returning, so a crash can never leave a
//! half-written record or operation behind.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::entity::EntityType;
use crate::error::{Error, Result};
use crate::op::{NewOperation, OpStatus, Operation, OperationId};
use crate::record::{Record, RecordState};

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL schema for the offline store.
pub const SCHEMA: &str = r#"
-- Locally held records; deleted = 1 marks a tombstone awaiting remote ack
CREATE TABLE IF NOT EXISTS records (
    local_id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    remote_id TEXT UNIQUE,
    version INTEGER NOT NULL DEFAULT 0,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    state TEXT NOT NULL DEFAULT 'local_only',
    deleted INTEGER NOT NULL DEFAULT 0
);

-- Pending mutation log; AUTOINCREMENT keeps ids monotonic across deletes
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    position INTEGER NOT NULL,
    entity_type TEXT NOT NULL,
    local_id TEXT NOT NULL,
    remote_id TEXT,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    next_attempt_at TEXT,
    superseded INTEGER NOT NULL DEFAULT 0,
    requeued_as INTEGER
);

CREATE INDEX IF NOT EXISTS idx_records_entity ON records(entity_type);
CREATE INDEX IF NOT EXISTS idx_operations_local ON operations(local_id, position);
CREATE INDEX IF NOT EXISTS idx_operations_status ON operations(status);
"#;

const OP_COLUMNS: &str = "id, position, entity_type, local_id, remote_id, kind, payload,
     created_at, status, attempts, last_error, next_attempt_at, superseded, requeued_as";

const RECORD_COLUMNS: &str =
    "local_id, entity_type, remote_id, version, payload, updated_at, state, deleted";

/// Filter for "still counts as pending work".
const UNRESOLVED: &str = "status != 'done' AND requeued_as IS NULL";

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| corrupted(format!("invalid value '{value}' in column '{column}'")))
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupted(format!("invalid timestamp '{value}' in column '{column}'")))
}

fn parse_json(value: &str, column: &str) -> std::result::Result<Value, rusqlite::Error> {
    serde_json::from_str(value)
        .map_err(|e| corrupted(format!("invalid JSON in column '{column}': {e}")))
}

fn corrupted(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(message)),
    )
}

fn row_to_record(row: &Row<'_>) -> std::result::Result<Record, rusqlite::Error> {
    let entity_str: String = row.get(1)?;
    let payload_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;
    let state_str: String = row.get(6)?;

    Ok(Record {
        local_id: row.get(0)?,
        entity_type: parse_db(&entity_str, "entity_type")?,
        remote_id: row.get(2)?,
        version: row.get(3)?,
        payload: parse_json(&payload_str, "payload")?,
        updated_at: parse_timestamp(&updated_str, "updated_at")?,
        state: parse_db::<RecordState>(&state_str, "state")?,
        deleted: row.get(7)?,
    })
}

fn row_to_operation(row: &Row<'_>) -> std::result::Result<Operation, rusqlite::Error> {
    let entity_str: String = row.get(2)?;
    let kind_str: String = row.get(5)?;
    let payload_str: String = row.get(6)?;
    let created_str: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let next_str: Option<String> = row.get(11)?;

    Ok(Operation {
        id: row.get(0)?,
        position: row.get(1)?,
        entity_type: parse_db(&entity_str, "entity_type")?,
        local_id: row.get(3)?,
        remote_id: row.get(4)?,
        kind: parse_db(&kind_str, "kind")?,
        payload: parse_json(&payload_str, "payload")?,
        created_at: parse_timestamp(&created_str, "created_at")?,
        status: parse_db(&status_str, "status")?,
        attempts: row.get(9)?,
        last_error: row.get(10)?,
        next_attempt_at: next_str
            .map(|s| parse_timestamp(&s, "next_attempt_at"))
            .transpose()?,
        superseded: row.get(12)?,
        requeued_as: row.get(13)?,
    })
}

/// Run schema creation and migrations on a connection.
///
/// Idempotent. Refuses stores written by a newer schema.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if found > SCHEMA_VERSION {
        return Err(Error::SchemaTooNew {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    conn.execute_batch(SCHEMA)?;
    if found < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
    }
    Ok(())
}

/// Local durable store for records and the operation queue.
pub struct LocalStore {
    conn: Connection,
    /// Backing file, or `None` for a volatile in-memory store.
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open (or create) the store at the given path and migrate it.
    ///
    /// Any failure to obtain persistent storage is reported as
    /// [`Error::StorageUnavailable`] so callers can fall back to
    /// [`LocalStore::open_in_memory`].
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_durable(path).map_err(|e| match e {
            Error::SchemaTooNew { .. } => e,
            other => Error::StorageUnavailable(format!("{}: {other}", path.display())),
        })
    }

    fn open_durable(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;
        run_migrations(&conn)?;

        Ok(LocalStore {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a volatile in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(LocalStore { conn, path: None })
    }

    /// Returns true if changes survive a restart.
    pub fn is_durable(&self) -> bool {
        self.path.is_some()
    }

    /// Path of the backing file, if durable.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside a savepoint; everything it writes commits or rolls back together.
    ///
    /// Savepoints nest, so store methods that are atomic on their own can be
    /// combined into a larger atomic unit.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("SAVEPOINT hse_atomic")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("RELEASE hse_atomic")?;
                Ok(value)
            }
            Err(e) => {
                let _ = self
                    .conn
                    .execute_batch("ROLLBACK TO hse_atomic; RELEASE hse_atomic");
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Records
    // ─────────────────────────────────────────────────────────────────────

    /// Insert or replace a record.
    ///
    /// An existing remote id is never overwritten or cleared.
    pub fn put(&mut self, record: &Record) -> Result<()> {
        self.atomically(|store| {
            if let (Some(existing), Some(new)) = (
                store.remote_id_of(&record.local_id)?,
                record.remote_id.as_deref(),
            ) {
                if existing != new {
                    return Err(Error::RemoteIdAlreadySet {
                        local_id: record.local_id.clone(),
                        existing,
                    });
                }
            }

            store.conn.execute(
                "INSERT INTO records (local_id, entity_type, remote_id, version, payload,
                 updated_at, state, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(local_id) DO UPDATE SET
                     entity_type = excluded.entity_type,
                     remote_id = COALESCE(records.remote_id, excluded.remote_id),
                     version = excluded.version,
                     payload = excluded.payload,
                     updated_at = excluded.updated_at,
                     state = excluded.state,
                     deleted = excluded.deleted",
                params![
                    record.local_id,
                    record.entity_type.as_str(),
                    record.remote_id,
                    record.version,
                    serde_json::to_string(&record.payload)?,
                    record.updated_at.to_rfc3339(),
                    record.state.as_str(),
                    record.deleted,
                ],
            )?;
            Ok(())
        })
    }

    /// Get a live (not deleted) record.
    pub fn get(&self, local_id: &str) -> Result<Option<Record>> {
        Ok(self
            .get_including_deleted(local_id)?
            .filter(|record| !record.deleted))
    }

    /// Get a record, including a tombstone awaiting remote delete.
    pub fn get_including_deleted(&self, local_id: &str) -> Result<Option<Record>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE local_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![local_id], row_to_record)
            .optional()?)
    }

    /// Check whether any row (live or tombstone) uses this local id.
    pub fn record_exists(&self, local_id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE local_id = ?1",
            params![local_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Permanently remove a record row. Returns false if it did not exist.
    pub fn delete(&mut self, local_id: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM records WHERE local_id = ?1", params![local_id])?;
        Ok(affected > 0)
    }

    /// List live records, optionally restricted to one entity type.
    pub fn list_records(&self, entity_type: Option<EntityType>) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records
             WHERE deleted = 0 AND (?1 IS NULL OR entity_type = ?1)
             ORDER BY updated_at DESC, local_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![entity_type.map(|e| e.as_str())], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn remote_id_of(&self, local_id: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT remote_id FROM records WHERE local_id = ?1",
                params![local_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten())
    }

    /// Assign the remote id for a record. Assigning the same id again is a no-op.
    pub fn set_remote_id(&mut self, local_id: &str, remote_id: &str) -> Result<()> {
        let record = self
            .get_including_deleted(local_id)?
            .ok_or_else(|| Error::RecordNotFound(local_id.to_string()))?;

        match record.remote_id {
            Some(existing) if existing == remote_id => Ok(()),
            Some(existing) => Err(Error::RemoteIdAlreadySet {
                local_id: local_id.to_string(),
                existing,
            }),
            None => {
                self.conn.execute(
                    "UPDATE records SET remote_id = ?1 WHERE local_id = ?2",
                    params![remote_id, local_id],
                )?;
                Ok(())
            }
        }
    }

    /// Record the version the remote acknowledged.
    pub fn set_version(&mut self, local_id: &str, version: i64) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE records SET version = ?1 WHERE local_id = ?2",
            params![version, local_id],
        )?;
        if affected == 0 {
            return Err(Error::RecordNotFound(local_id.to_string()));
        }
        Ok(())
    }

    /// Replace local contents with the remote's (remote-wins conflict resolution).
    ///
    /// Clears a local tombstone: the remote still has the record.
    pub fn overwrite_from_remote(
        &mut self,
        local_id: &str,
        payload: &Value,
        version: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE records SET payload = ?1, version = ?2, updated_at = ?3, deleted = 0
             WHERE local_id = ?4",
            params![
                serde_json::to_string(payload)?,
                version,
                now.to_rfc3339(),
                local_id
            ],
        )?;
        if affected == 0 {
            return Err(Error::RecordNotFound(local_id.to_string()));
        }
        Ok(())
    }

    /// Set the record's two-phase state from its queue contents.
    ///
    /// Returns the new state, or `None` if the record no longer exists.
    pub fn refresh_state(&mut self, local_id: &str) -> Result<Option<RecordState>> {
        let unresolved = self.count_unresolved_for(local_id)?;
        let state = if unresolved == 0 {
            RecordState::Confirmed
        } else {
            RecordState::LocalOnly
        };
        let affected = self.conn.execute(
            "UPDATE records SET state = ?1 WHERE local_id = ?2",
            params![state.as_str(), local_id],
        )?;
        Ok((affected > 0).then_some(state))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────

    /// Append an operation with status `Pending`, allocating its id.
    pub fn enqueue(&mut self, op: &NewOperation) -> Result<Operation> {
        self.atomically(|store| {
            store.conn.execute(
                "INSERT INTO operations (position, entity_type, local_id, remote_id, kind,
                 payload, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending')",
                params![
                    op.position.unwrap_or(0),
                    op.entity_type.as_str(),
                    op.local_id,
                    op.remote_id,
                    op.kind.as_str(),
                    serde_json::to_string(&op.payload)?,
                    op.created_at.to_rfc3339(),
                ],
            )?;
            let id = store.conn.last_insert_rowid();
            if op.position.is_none() {
                store.conn.execute(
                    "UPDATE operations SET position = id WHERE id = ?1",
                    params![id],
                )?;
            }
            store.get_operation(id)
        })
    }

    /// Get an operation by id.
    pub fn get_operation(&self, id: OperationId) -> Result<Operation> {
        let sql = format!("SELECT {OP_COLUMNS} FROM operations WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], row_to_operation)
            .optional()?
            .ok_or(Error::OperationNotFound(id))
    }

    fn query_operations(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Operation>> {
        let sql = format!(
            "SELECT {OP_COLUMNS} FROM operations WHERE {filter} ORDER BY position, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let ops = stmt
            .query_map(args, row_to_operation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    /// All operations that still count as pending work, in delivery order.
    pub fn list_pending(&self) -> Result<Vec<Operation>> {
        self.query_operations(UNRESOLVED, &[])
    }

    /// Every operation ever queued for a record (including done ones), in order.
    pub fn operations_for(&self, local_id: &str) -> Result<Vec<Operation>> {
        self.query_operations("local_id = ?1", &[&local_id])
    }

    /// Operations in the given status, in order.
    pub fn list_by_status(&self, status: OpStatus) -> Result<Vec<Operation>> {
        self.query_operations("status = ?1", &[&status.as_str()])
    }

    /// Failed operations that have not been retried yet.
    pub fn list_failed(&self) -> Result<Vec<Operation>> {
        self.query_operations("status = 'failed' AND requeued_as IS NULL", &[])
    }

    /// Operations discarded by conflict resolution (kept for audit).
    pub fn list_superseded(&self) -> Result<Vec<Operation>> {
        self.query_operations("superseded = 1", &[])
    }

    /// Every operation in the store, in order.
    pub fn list_operations(&self) -> Result<Vec<Operation>> {
        self.query_operations("1 = 1", &[])
    }

    /// Number of operations still counting as pending work.
    pub fn count_unresolved(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM operations WHERE {UNRESOLVED}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn count_unresolved_for(&self, local_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM operations WHERE local_id = ?1 AND {UNRESOLVED}"),
            params![local_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of failed operations awaiting a manual retry.
    pub fn count_failed(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM operations WHERE status = 'failed' AND requeued_as IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Change an operation's status, enforcing the allowed transitions.
    ///
    /// When `error` is given it replaces `last_error`.
    pub fn mark_status(
        &mut self,
        id: OperationId,
        status: OpStatus,
        error: Option<&str>,
    ) -> Result<Operation> {
        self.atomically(|store| {
            let op = store.get_operation(id)?;
            if !op.status.can_transition_to(status) {
                return Err(Error::InvalidTransition {
                    from: op.status.to_string(),
                    to: status.to_string(),
                });
            }
            store.conn.execute(
                "UPDATE operations SET status = ?1, last_error = COALESCE(?2, last_error)
                 WHERE id = ?3",
                params![status.as_str(), error, id],
            )?;
            store.get_operation(id)
        })
    }

    /// Mark an operation as handed to the remote.
    pub fn begin_attempt(&mut self, id: OperationId) -> Result<Operation> {
        self.mark_status(id, OpStatus::InFlight, None)
    }

    /// Mark an in-flight operation as done, optionally annotated as superseded.
    pub fn complete(&mut self, id: OperationId, superseded: bool) -> Result<Operation> {
        self.atomically(|store| {
            store.mark_status(id, OpStatus::Done, None)?;
            store.conn.execute(
                "UPDATE operations SET superseded = ?1, next_attempt_at = NULL WHERE id = ?2",
                params![superseded, id],
            )?;
            store.get_operation(id)
        })
    }

    /// Count a failed attempt and return the operation to `Pending`, due at `next_attempt_at`.
    pub fn retry_later(
        &mut self,
        id: OperationId,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<Operation> {
        self.atomically(|store| {
            store.mark_status(id, OpStatus::Pending, Some(error))?;
            store.conn.execute(
                "UPDATE operations SET attempts = attempts + 1, next_attempt_at = ?1
                 WHERE id = ?2",
                params![next_attempt_at.to_rfc3339(), id],
            )?;
            store.get_operation(id)
        })
    }

    /// Count a failed attempt and mark the operation `Failed`.
    pub fn fail(&mut self, id: OperationId, error: &str) -> Result<Operation> {
        self.atomically(|store| {
            store.mark_status(id, OpStatus::Failed, Some(error))?;
            store.conn.execute(
                "UPDATE operations SET attempts = attempts + 1, next_attempt_at = NULL
                 WHERE id = ?1",
                params![id],
            )?;
            store.get_operation(id)
        })
    }

    /// Replace the payload of an operation that has not been sent.
    pub fn update_payload(&mut self, id: OperationId, payload: &Value) -> Result<Operation> {
        let affected = self.conn.execute(
            "UPDATE operations SET payload = ?1 WHERE id = ?2",
            params![serde_json::to_string(payload)?, id],
        )?;
        if affected == 0 {
            return Err(Error::OperationNotFound(id));
        }
        self.get_operation(id)
    }

    /// Remove an operation from the queue (coalescing).
    pub fn remove_operation(&mut self, id: OperationId) -> Result<()> {
        let affected = self
            .conn
            .execute("DELETE FROM operations WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(Error::OperationNotFound(id));
        }
        Ok(())
    }

    /// Link a failed operation to the operation that replaced it.
    pub fn mark_requeued(&mut self, id: OperationId, replacement: OperationId) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE operations SET requeued_as = ?1
             WHERE id = ?2 AND status = 'failed' AND requeued_as IS NULL",
            params![replacement, id],
        )?;
        if affected == 0 {
            return Err(Error::InvalidTransition {
                from: self.get_operation(id)?.status.to_string(),
                to: "requeued".to_string(),
            });
        }
        Ok(())
    }

    /// Return operations left `InFlight` by a crash to `Pending`.
    ///
    /// The interrupted attempt is not counted.
    pub fn reset_in_flight(&mut self) -> Result<usize> {
        let affected = self.conn.execute(
            "UPDATE operations SET status = 'pending' WHERE status = 'in_flight'",
            [],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
