// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hse_core::EntityType;

use crate::config::ConflictPolicy;

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "hse-sync")]
#[command(version)]
#[command(about = "Offline-first change queue and sync for HSE records")]
#[command(
    long_about = "Offline-first change queue and sync for HSE records.\n\n\
    Incidents, permits, and risk assessments are saved locally first and\n\
    delivered to the remote system of record whenever it can be reached."
)]
pub struct Cli {
    /// State directory [default: $HSE_SYNC_STATE_DIR, else $XDG_STATE_HOME/hse-sync]
    #[arg(long, global = true, value_name = "dir")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the state directory, config file, and local store
    Init {
        /// WebSocket URL of the system of record
        #[arg(long, value_name = "url")]
        remote: Option<String>,
        /// What to do when the remote changed a record first (remote-wins, local-wins)
        #[arg(long, value_name = "policy")]
        conflict_policy: Option<ConflictPolicy>,
    },

    /// Save a new record locally and queue it for sync
    #[command(arg_required_else_help = true)]
    Create {
        /// Entity type (incident, permit, fmea, hazop, jsa, lopa, bow-tie, what-if, organization)
        entity: EntityType,
        /// Record contents as a JSON object
        #[arg(long, short = 'd', value_name = "json")]
        data: String,
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Replace a record's contents and queue the change
    #[command(arg_required_else_help = true)]
    Update {
        /// Local record ID
        id: String,
        /// New contents as a JSON object
        #[arg(long, short = 'd', value_name = "json")]
        data: String,
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Delete a record and queue the deletion
    #[command(arg_required_else_help = true)]
    Delete {
        /// Local record ID
        id: String,
    },

    /// Show a record and its queued operations
    #[command(arg_required_else_help = true)]
    Show {
        /// Local record ID
        id: String,
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List local records
    List {
        /// Only records of this entity type
        #[arg(long = "type", short = 't', value_name = "entity")]
        entity: Option<EntityType>,
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show connectivity and queue counts
    Status {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// List queued operations
    Queue {
        /// Only operations that need a manual retry
        #[arg(long, conflicts_with = "superseded")]
        failed: bool,
        /// Local changes discarded by conflict resolution
        #[arg(long)]
        superseded: bool,
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Send queued operations to the remote now
    Sync {
        /// Output format (text, json)
        #[arg(long = "output", short = 'o', value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Re-queue failed operations
    Retry,

    /// Keep syncing in the foreground until interrupted
    Watch {
        /// Seconds between sync passes [default: sync.interval_secs from config]
        #[arg(long, value_name = "secs")]
        interval: Option<u64>,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
