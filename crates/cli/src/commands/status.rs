// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::display::format_status;
use crate::error::Result;
use crate::state::SyncStatus;

use super::{open_context, print_json};

#[derive(Serialize)]
struct StatusReport<'a> {
    remote: &'a str,
    durable: bool,
    #[serde(flatten)]
    status: SyncStatus,
}

pub async fn run(state_dir: &Path, output: OutputFormat) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    let status = ctx.status();
    let remote = ctx.config().remote.url.as_str();

    match output {
        OutputFormat::Json => print_json(&StatusReport {
            remote,
            durable: ctx.is_durable(),
            status,
        })?,
        OutputFormat::Text => println!("{}", format_status(&status, remote, ctx.is_durable())),
    }
    Ok(())
}
