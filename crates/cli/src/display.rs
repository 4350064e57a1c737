// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use hse_core::{Operation, Record};

use crate::engine::SyncSummary;
use crate::state::SyncStatus;

/// Format a single record line for list output
pub fn format_record_line(record: &Record) -> String {
    let remote = match &record.remote_id {
        Some(remote_id) => format!("{} v{}", remote_id, record.version),
        None => "not synced".to_string(),
    };
    format!(
        "- [{}] ({}) {}: {}",
        record.entity_type, record.state, record.local_id, remote
    )
}

/// Format record details for the show command
pub fn format_record_details(record: &Record, operations: &[Operation]) -> String {
    let mut output = Vec::new();

    output.push(format!("[{}] {}", record.entity_type, record.local_id));
    output.push(format!("State: {}", record.state));
    match &record.remote_id {
        Some(remote_id) => {
            output.push(format!("Remote: {}", remote_id));
            output.push(format!("Version: {}", record.version));
        }
        None => output.push("Remote: not synced".to_string()),
    }
    output.push(format!(
        "Updated: {}",
        record.updated_at.format("%Y-%m-%d %H:%M")
    ));

    output.push(String::new());
    output.push("Payload:".to_string());
    let payload =
        serde_json::to_string_pretty(&record.payload).unwrap_or_else(|_| record.payload.to_string());
    for line in payload.lines() {
        output.push(format!("    {}", line));
    }

    if !operations.is_empty() {
        output.push(String::new());
        output.push("Operations:".to_string());
        for op in operations {
            output.push(format!("  {}", format_operation(op)));
        }
    }

    output.join("\n")
}

/// Format a single operation for queue output
pub fn format_operation(op: &Operation) -> String {
    let mut line = format!(
        "#{} {} {} {} ({})",
        op.id,
        op.created_at.format("%Y-%m-%d %H:%M"),
        op.kind,
        op.local_id,
        op.status
    );
    if op.superseded {
        line.push_str(" superseded");
    }
    if op.attempts > 0 {
        line.push_str(&format!(", {} attempt(s)", op.attempts));
    }
    if let Some(at) = op.next_attempt_at {
        if op.status == hse_core::OpStatus::Pending {
            line.push_str(&format!(", next try {}", at.format("%H:%M:%S")));
        }
    }
    if let Some(error) = &op.last_error {
        line.push_str(&format!(": {}", error));
    }
    if let Some(replacement) = op.requeued_as {
        line.push_str(&format!(" -> #{}", replacement));
    }
    line
}

pub fn format_summary(summary: &SyncSummary) -> String {
    format!(
        "Synced: {} succeeded, {} failed, {} superseded",
        summary.succeeded, summary.failed, summary.superseded
    )
}

/// Format sync status for the status command
pub fn format_status(status: &SyncStatus, remote_url: &str, durable: bool) -> String {
    let mut output = Vec::new();
    let connectivity = if status.is_online { "online" } else { "offline" };
    output.push(format!("Remote: {} ({})", remote_url, connectivity));
    output.push(format!("Pending: {}", status.pending_count));
    if status.failed_count > 0 {
        output.push(format!(
            "Failed: {} (run 'hse-sync retry' to re-queue)",
            status.failed_count
        ));
    }
    if let Some(at) = status.last_sync_at {
        output.push(format!("Last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if !durable {
        output.push("Storage: in-memory (changes are lost on exit)".to_string());
    }
    output.join("\n")
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
