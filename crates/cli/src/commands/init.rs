// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::Path;

use hse_core::LocalStore;

use crate::config::{db_path, Config, ConflictPolicy};
use crate::error::{Error, Result};

pub fn run(
    state_dir: &Path,
    remote: Option<String>,
    conflict_policy: Option<ConflictPolicy>,
) -> Result<()> {
    let config = init_state_dir(state_dir, remote, conflict_policy)?;

    println!("Initialized hse-sync in {}", state_dir.display());
    println!("Remote: {}", config.remote.url);
    println!("Conflict policy: {}", config.sync.conflict_policy);
    Ok(())
}

/// Write config.toml and create the local store.
///
/// An existing config.toml is kept and only the given settings change.
pub(crate) fn init_state_dir(
    state_dir: &Path,
    remote: Option<String>,
    conflict_policy: Option<ConflictPolicy>,
) -> Result<Config> {
    let db = db_path(state_dir);
    if db.exists() {
        return Err(Error::AlreadyInitialized(state_dir.display().to_string()));
    }

    let mut config = Config::load(state_dir)?;
    if let Some(url) = remote {
        config.remote.url = url;
    }
    if let Some(policy) = conflict_policy {
        config.sync.conflict_policy = policy;
    }
    config.validate()?;

    fs::create_dir_all(state_dir)?;
    config.save(state_dir)?;
    LocalStore::open(&db)?;
    Ok(config)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
