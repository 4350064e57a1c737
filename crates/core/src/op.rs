// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued mutation intents.
//!
//! Every local create, update, or delete of a record is captured as an
//! [`Operation`] and replayed against the remote system of record by the
//! sync engine. Operations for the same record are delivered in `position`
//! order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::entity::EntityType;
use crate::error::{Error, Result};

/// Unique, monotonically increasing identifier for an operation.
pub type OperationId = i64;

/// The kind of mutation an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    /// Returns the string representation used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "create" => Ok(OpKind::Create),
            "update" => Ok(OpKind::Update),
            "delete" => Ok(OpKind::Delete),
            _ => Err(Error::InvalidOpKind(s.to_string())),
        }
    }
}

/// Delivery status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    /// Waiting to be sent (first time or after a transient failure).
    Pending,
    /// Handed to the remote; no answer yet.
    InFlight,
    /// Delivery gave up: rejected by the remote or retries exhausted.
    Failed,
    /// Acknowledged by the remote (or superseded by a remote change).
    Done,
}

impl OpStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpStatus::Pending => "pending",
            OpStatus::InFlight => "in_flight",
            OpStatus::Failed => "failed",
            OpStatus::Done => "done",
        }
    }

    /// Check if a transition from this status to target is valid.
    ///
    /// `InFlight -> Pending` is the retry-pending step after a transient
    /// failure or crash recovery. `Done` and `Failed` never change.
    pub fn can_transition_to(&self, target: OpStatus) -> bool {
        matches!(
            (self, target),
            (OpStatus::Pending, OpStatus::InFlight)
                | (OpStatus::InFlight, OpStatus::Pending)
                | (OpStatus::InFlight, OpStatus::Done)
                | (OpStatus::InFlight, OpStatus::Failed)
        )
    }

    /// Returns true if this is a terminal state (done or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OpStatus::Done | OpStatus::Failed)
    }
}

impl fmt::Display for OpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OpStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OpStatus::Pending),
            "in_flight" => Ok(OpStatus::InFlight),
            "failed" => Ok(OpStatus::Failed),
            "done" => Ok(OpStatus::Done),
            _ => Err(Error::InvalidOpStatus(s.to_string())),
        }
    }
}

/// Prefix of `last_error` for operations the remote refused.
pub const REJECTED_PREFIX: &str = "rejected: ";

/// A queued mutation intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique identifier, allocated by the store.
    pub id: OperationId,
    /// Ordering key. Equal to `id` except for manual retries, which keep the
    /// position of the operation they replace.
    pub position: i64,
    pub entity_type: EntityType,
    pub local_id: String,
    /// Remote id known when the operation was queued, if any.
    pub remote_id: Option<String>,
    pub kind: OpKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub status: OpStatus,
    /// Number of failed delivery attempts.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Earliest time the next attempt may be made (backoff).
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// Set when the operation was discarded by conflict resolution.
    pub superseded: bool,
    /// Set on a failed operation once a manual retry replaced it.
    pub requeued_as: Option<OperationId>,
}

impl Operation {
    /// Returns true while the operation still counts as pending work.
    pub fn is_unresolved(&self) -> bool {
        self.status != OpStatus::Done && self.requeued_as.is_none()
    }

    /// Returns true if the operation has never been handed to the remote.
    pub fn is_unsent(&self) -> bool {
        self.status == OpStatus::Pending && self.attempts == 0
    }

    /// Returns true if the remote refused the operation on its only attempt.
    ///
    /// A refused operation was not applied remotely. Any earlier attempt may
    /// have reached the remote, so those do not count.
    pub fn is_refused_unapplied(&self) -> bool {
        self.status == OpStatus::Failed
            && self.attempts == 1
            && self
                .last_error
                .as_deref()
                .is_some_and(|error| error.starts_with(REJECTED_PREFIX))
    }

    /// Returns true if the backoff delay, if any, has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

/// An operation that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub entity_type: EntityType,
    pub local_id: String,
    pub remote_id: Option<String>,
    pub kind: OpKind,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// Position to inherit; `None` means the new id is used.
    pub position: Option<i64>,
}

impl NewOperation {
    /// Creates a new operation intent ordered after everything already queued.
    pub fn new(
        kind: OpKind,
        entity_type: EntityType,
        local_id: impl Into<String>,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        NewOperation {
            entity_type,
            local_id: local_id.into(),
            remote_id: None,
            kind,
            payload,
            created_at,
            position: None,
        }
    }

    /// Sets the remote id known at queue time.
    pub fn with_remote_id(mut self, remote_id: Option<String>) -> Self {
        self.remote_id = remote_id;
        self
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
