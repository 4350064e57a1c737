// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::display::format_summary;
use crate::engine::SyncSummary;
use crate::error::Result;
use crate::state::SyncStatus;

use super::{open_context, print_json};

#[derive(Serialize)]
struct SyncReport {
    #[serde(flatten)]
    summary: SyncSummary,
    status: SyncStatus,
}

/// Drain the queue once. Offline is not an error: the queue is kept.
pub async fn run(state_dir: &Path, output: OutputFormat) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    let online = ctx.is_online();
    let summary = ctx.sync_now().await?;
    let status = ctx.status();

    match output {
        OutputFormat::Json => print_json(&SyncReport { summary, status })?,
        OutputFormat::Text => {
            if online {
                println!("{}", format_summary(&summary));
            } else {
                println!("Offline: {} is not reachable", ctx.config().remote.url);
            }
            println!("Pending operations: {}", status.pending_count);
            if status.failed_count > 0 {
                println!(
                    "Failed operations: {} (run 'hse-sync retry' to re-queue)",
                    status.failed_count
                );
            }
        }
    }
    ctx.shutdown().await;
    Ok(())
}

/// Re-queue failed operations for the next sync.
pub async fn retry(state_dir: &Path) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    let requeued = ctx.retry_failed()?;
    if requeued == 0 {
        println!("No failed operations");
    } else {
        println!("Re-queued {} failed operation(s)", requeued);
    }
    ctx.shutdown().await;
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
