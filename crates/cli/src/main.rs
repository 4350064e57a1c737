// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fs;
use std::path::Path;

use clap::Parser;
use hsesync::{config, env, Cli, Command};

fn main() {
    let cli = Cli::parse();
    let result = config::resolve_state_dir(cli.state_dir.as_deref()).and_then(|state_dir| {
        setup_logging(&cli.command, &state_dir);
        hsesync::run(cli.command, &state_dir)
    });
    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// `watch` logs to `sync.log` in the state directory; one-shot commands log
/// warnings to stderr.
fn setup_logging(command: &Command, state_dir: &Path) {
    use tracing_subscriber::EnvFilter;

    if matches!(command, Command::Watch { .. }) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        if let Ok(file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config::log_path(state_dir))
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .init();
            return;
        }
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!env::no_color())
        .init();
}
