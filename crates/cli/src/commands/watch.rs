// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground auto-sync: probe the remote and drain the queue on a timer
//! until interrupted.

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::error::{Error, Result};

use super::open_context;

pub async fn run(state_dir: &Path, interval_secs: Option<u64>) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    if !ctx.can_sync() {
        return Err(Error::SyncLocked(state_dir.display().to_string()));
    }
    let interval = match interval_secs {
        Some(0) => return Err(Error::Config("--interval must be at least 1".to_string())),
        Some(secs) => Duration::from_secs(secs),
        None => ctx.config().sync.interval(),
    };

    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        ctx.config().remote.url,
        interval.as_secs()
    );
    info!(interval_secs = interval.as_secs(), "watch started");

    if ctx.is_online() {
        let summary = ctx.sync_now().await?;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            superseded = summary.superseded,
            "initial sync finished"
        );
    }
    ctx.start_auto_sync(interval)?;

    tokio::signal::ctrl_c().await?;
    println!("Stopping...");
    ctx.shutdown().await;
    info!("watch stopped");
    Ok(())
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
