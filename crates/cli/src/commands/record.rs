// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local record changes: create, update, delete, show, list.
//!
//! Changes are written to the local store only; `hse-sync sync` or a running
//! `hse-sync watch` delivers them.

use std::path::Path;

use serde::Serialize;

use hse_core::{Appended, EntityType, Operation, Record};

use crate::cli::OutputFormat;
use crate::context::SyncContext;
use crate::display::{format_record_details, format_record_line};
use crate::error::{Error, Result};

use super::{open_context, parse_payload, print_json};

#[derive(Serialize)]
struct RecordDetails<'a> {
    #[serde(flatten)]
    record: &'a Record,
    operations: &'a [Operation],
}

pub async fn create(
    state_dir: &Path,
    entity_type: EntityType,
    data: &str,
    output: OutputFormat,
) -> Result<()> {
    let payload = parse_payload(data)?;
    let ctx = open_context(state_dir).await?;
    let record = ctx.create(entity_type, payload)?;

    match output {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            println!("Created [{}] {}", record.entity_type, record.local_id);
            print_pending(&ctx);
        }
    }
    Ok(())
}

pub async fn update(state_dir: &Path, id: &str, data: &str, output: OutputFormat) -> Result<()> {
    let payload = parse_payload(data)?;
    let ctx = open_context(state_dir).await?;
    let record = ctx.update(id, payload)?;

    match output {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            println!("Updated {}", record.local_id);
            print_pending(&ctx);
        }
    }
    Ok(())
}

pub async fn delete(state_dir: &Path, id: &str) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    match ctx.delete(id)? {
        Appended::Collapsed { .. } => {
            println!("Deleted {} (never synced, nothing to send)", id)
        }
        Appended::Queued { .. } | Appended::Merged(_) => {
            println!("Deleted {}", id);
            print_pending(&ctx);
        }
    }
    Ok(())
}

pub async fn show(state_dir: &Path, id: &str, output: OutputFormat) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    let record = ctx
        .record(id)?
        .ok_or_else(|| Error::Core(hse_core::Error::RecordNotFound(id.to_string())))?;
    let operations = ctx.operations_for(id)?;

    match output {
        OutputFormat::Json => print_json(&RecordDetails {
            record: &record,
            operations: &operations,
        })?,
        OutputFormat::Text => println!("{}", format_record_details(&record, &operations)),
    }
    Ok(())
}

pub async fn list(
    state_dir: &Path,
    entity_type: Option<EntityType>,
    output: OutputFormat,
) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    let records = ctx.records(entity_type)?;

    match output {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No records");
            }
            for record in &records {
                println!("{}", format_record_line(record));
            }
        }
    }
    Ok(())
}

fn print_pending(ctx: &SyncContext) {
    println!("Pending operations: {}", ctx.pending_count());
}
