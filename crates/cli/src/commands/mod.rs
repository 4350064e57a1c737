// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod init;
pub mod queue;
pub mod record;
pub mod status;
pub mod sync;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::config::{db_path, Config};
use crate::context::{ContextOptions, SyncContext};
use crate::error::{Error, Result};
use crate::remote::{RemoteStore, WebSocketRemote};

/// Fail unless `hse-sync init` ran for this state directory.
pub fn ensure_initialized(state_dir: &Path) -> Result<()> {
    if db_path(state_dir).exists() {
        Ok(())
    } else {
        Err(Error::NotInitialized(state_dir.display().to_string()))
    }
}

/// Open the sync context for an initialized state directory.
pub async fn open_context(state_dir: &Path) -> Result<SyncContext> {
    ensure_initialized(state_dir)?;
    let config = Config::load(state_dir)?;
    let remote: Arc<dyn RemoteStore> = Arc::new(WebSocketRemote::new(config.remote.url.clone()));
    SyncContext::init(ContextOptions::new(config).with_state_dir(state_dir), remote).await
}

/// Parse `--data` into a JSON value.
pub(crate) fn parse_payload(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| Error::InvalidData(e.to_string()))
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
