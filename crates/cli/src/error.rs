// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the hsesync library.
///
/// Errors provide user-friendly messages with hints for common issues.
/// Remote delivery failures are not errors: the sync engine turns them into
/// queue status changes (see [`crate::remote::RemoteError`]).
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: run 'hse-sync init' first\n  hint: state directory is {0}")]
    NotInitialized(String),

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("invalid JSON in --data: {0}\n  hint: pass an object, e.g. --data '{{\"title\": \"...\"}}'")]
    InvalidData(String),

    #[error("payload must be a JSON object\n  hint: got {0}")]
    PayloadNotObject(String),

    #[error("invalid conflict policy: '{0}'\n  hint: valid policies are: remote-wins, local-wins")]
    InvalidConflictPolicy(String),

    #[error("invalid remote URL '{0}': must start with ws:// or wss://")]
    InvalidRemoteUrl(String),

    #[error("another hse-sync process is syncing {0}\n  hint: stop 'hse-sync watch' or wait for the running sync")]
    SyncLocked(String),

    #[error("cannot determine state directory\n  hint: pass --state-dir or set HSE_SYNC_STATE_DIR")]
    NoStateDir,

    #[error(transparent)]
    Core(#[from] hse_core::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// A specialized Result type for hsesync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
