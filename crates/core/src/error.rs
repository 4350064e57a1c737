// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for hse-core operations.

use thiserror::Error;

/// All possible errors that can occur in hse-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("local storage unavailable: {0}\n  hint: changes will only be kept in memory until restart")]
    StorageUnavailable(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("record {0} already has queued changes\n  hint: queue an update instead of a second create")]
    AlreadyQueued(String),

    #[error("operation not found: {0}")]
    OperationNotFound(i64),

    #[error("invalid operation status transition: cannot go from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("remote id for {local_id} is already set to '{existing}'")]
    RemoteIdAlreadySet { local_id: String, existing: String },

    #[error(
        "invalid entity type: '{0}'\n  hint: valid types are: incident, permit, fmea, hazop, jsa, lopa, bow_tie, what_if, organization"
    )]
    InvalidEntityType(String),

    #[error("invalid operation kind: '{0}'\n  hint: valid kinds are: create, update, delete")]
    InvalidOpKind(String),

    #[error("invalid operation status: '{0}'\n  hint: valid statuses are: pending, in_flight, failed, done")]
    InvalidOpStatus(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("database schema version {found} is newer than supported version {supported}\n  hint: upgrade hse-sync to open this store")]
    SchemaTooNew { found: i64, supported: i64 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for hse-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
