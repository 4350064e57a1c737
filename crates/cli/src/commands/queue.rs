// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::cli::OutputFormat;
use crate::display::format_operation;
use crate::error::Result;

use super::{open_context, print_json};

/// Which slice of the queue to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueView {
    /// Everything still waiting for the remote, failed operations included.
    Pending,
    Failed,
    Superseded,
}

impl QueueView {
    pub fn from_flags(failed: bool, superseded: bool) -> Self {
        match (failed, superseded) {
            (true, _) => QueueView::Failed,
            (_, true) => QueueView::Superseded,
            _ => QueueView::Pending,
        }
    }

    fn empty_message(self) -> &'static str {
        match self {
            QueueView::Pending => "No pending operations",
            QueueView::Failed => "No failed operations",
            QueueView::Superseded => "No superseded operations",
        }
    }
}

pub async fn run(state_dir: &Path, view: QueueView, output: OutputFormat) -> Result<()> {
    let ctx = open_context(state_dir).await?;
    let operations = match view {
        QueueView::Pending => ctx.pending_operations()?,
        QueueView::Failed => ctx.failed_operations()?,
        QueueView::Superseded => ctx.superseded()?,
    };

    match output {
        OutputFormat::Json => print_json(&operations)?,
        OutputFormat::Text => {
            if operations.is_empty() {
                println!("{}", view.empty_message());
            }
            for op in &operations {
                println!("{}", format_operation(op));
            }
        }
    }
    Ok(())
}
