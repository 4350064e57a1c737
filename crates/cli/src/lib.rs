// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! hsesync - offline-first sync for HSE records.
//!
//! This crate provides the client side of the offline sync subsystem used by
//! the `hse-sync` CLI: local changes are saved to the durable store and
//! queued, then delivered to the remote system of record whenever it can be
//! reached.
//!
//! # Main Components
//!
//! - [`SyncContext`] - built once at startup; owns the store, engine, and timers
//! - [`SyncEngine`] - drains the queue, applies retry and conflict policy
//! - [`monitor`] - connectivity state and the cancellable auto-sync timer
//! - [`RemoteStore`] - the seam to the system of record
//! - [`Config`] - `config.toml` in the state directory
//!
//! # Usage
//!
//! ```rust,ignore
//! use hsesync::{Config, ContextOptions, SyncContext, WebSocketRemote};
//!
//! let config = Config::load(&state_dir)?;
//! let remote = Arc::new(WebSocketRemote::new(config.remote.url.clone()));
//! let ctx = SyncContext::init(ContextOptions::new(config).with_state_dir(&state_dir), remote).await?;
//!
//! let record = ctx.create(EntityType::Incident, json!({"title": "Spill in bay 3"}))?;
//! ctx.sync_now().await?;
//! ctx.shutdown().await;
//! ```

mod cli;
mod commands;
mod display;

pub mod backoff;
pub mod config;
pub mod context;
pub mod engine;
pub mod env;
pub mod error;
pub mod id;
pub mod monitor;
pub mod remote;
pub mod state;

pub use cli::{Cli, Command, OutputFormat};
pub use config::{resolve_state_dir, Config, ConflictPolicy};
pub use context::{ContextOptions, SyncContext};
pub use engine::{EngineConfig, SyncEngine, SyncSummary};
pub use error::{Error, Result};
pub use remote::{RemoteStore, WebSocketRemote};
pub use state::SyncStatus;

use std::path::Path;

use commands::queue::QueueView;

/// Execute a CLI command against a state directory.
///
/// `init` runs without an async runtime; every other command opens a
/// [`SyncContext`] on a fresh tokio runtime.
pub fn run(command: Command, state_dir: &Path) -> Result<()> {
    if let Command::Init {
        remote,
        conflict_policy,
    } = command
    {
        return commands::init::run(state_dir, remote, conflict_policy);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(dispatch(command, state_dir))
}

async fn dispatch(command: Command, state_dir: &Path) -> Result<()> {
    match command {
        Command::Init {
            remote,
            conflict_policy,
        } => commands::init::run(state_dir, remote, conflict_policy),
        Command::Create {
            entity,
            data,
            output,
        } => commands::record::create(state_dir, entity, &data, output).await,
        Command::Update { id, data, output } => {
            commands::record::update(state_dir, &id, &data, output).await
        }
        Command::Delete { id } => commands::record::delete(state_dir, &id).await,
        Command::Show { id, output } => commands::record::show(state_dir, &id, output).await,
        Command::List { entity, output } => commands::record::list(state_dir, entity, output).await,
        Command::Status { output } => commands::status::run(state_dir, output).await,
        Command::Queue {
            failed,
            superseded,
            output,
        } => commands::queue::run(state_dir, QueueView::from_flags(failed, superseded), output).await,
        Command::Sync { output } => commands::sync::run(state_dir, output).await,
        Command::Retry => commands::sync::retry(state_dir).await,
        Command::Watch { interval } => commands::watch::run(state_dir, interval).await,
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
