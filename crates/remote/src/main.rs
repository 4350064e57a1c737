// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! hse-remote: reference system-of-record server for hse-sync.
//!
//! Holds versioned HSE records in memory and answers `apply` requests with
//! an acknowledgement, a conflict, or a rejection. Meant for end-to-end runs
//! of the sync client, not for production data.

mod server;
mod state;

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// hse-remote: reference system of record for hse-sync
#[derive(Parser, Debug)]
#[command(name = "hse-remote")]
#[command(about = "In-memory WebSocket system of record for hse-sync")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1:7890")]
    bind: SocketAddr,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting hse-remote server");
    info!("  Bind address: {}", args.bind);

    server::run(args.bind, state::ServerState::new()).await
}
