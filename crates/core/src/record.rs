// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Locally stored HSE records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::entity::EntityType;
use crate::error::{Error, Result};

/// Whether the remote system of record has confirmed the local contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Saved locally; at least one change is still waiting for the remote.
    LocalOnly,
    /// Every local change has been acknowledged by the remote.
    Confirmed,
}

impl RecordState {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::LocalOnly => "local_only",
            RecordState::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local_only" => Ok(RecordState::LocalOnly),
            "confirmed" => Ok(RecordState::Confirmed),
            _ => Err(Error::CorruptedData(format!("invalid record state '{s}'"))),
        }
    }
}

/// A domain entity (incident, permit, assessment, ...) held by the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Client-generated id, stable from offline creation onward.
    pub local_id: String,
    pub entity_type: EntityType,
    /// Assigned once the remote acknowledges the create. Never changes after.
    pub remote_id: Option<String>,
    /// Last remote-acknowledged version; 0 if never confirmed.
    pub version: i64,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
    pub state: RecordState,
    /// Tombstone: deleted locally, delete not yet acknowledged.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

impl Record {
    /// Creates a record that only exists locally.
    pub fn new(
        local_id: impl Into<String>,
        entity_type: EntityType,
        payload: Value,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Record {
            local_id: local_id.into(),
            entity_type,
            remote_id: None,
            version: 0,
            payload,
            updated_at,
            state: RecordState::LocalOnly,
            deleted: false,
        }
    }

    /// Returns true once the remote has confirmed every local change.
    pub fn is_confirmed(&self) -> bool {
        self.state == RecordState::Confirmed
    }
}
