// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages between the sync client and the remote
//! system of record.
//!
//! The protocol is request/response:
//! - Client sends one `apply` per operation, tagged with a request id
//! - Server answers with `ack`, `rejected`, `conflict`, or `unavailable`
//!   carrying the same request id

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityType;
use crate::op::{OpKind, OperationId};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Apply one queued operation.
    ///
    /// `operation_id` is stable across retries, so the server can treat a
    /// repeated delivery as a no-op.
    Apply {
        request_id: u64,
        operation_id: OperationId,
        entity_type: EntityType,
        kind: OpKind,
        #[serde(default)]
        payload: Value,
        /// Required for update and delete.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_id: Option<String>,
        /// Version the client last saw; mismatches are conflicts.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_version: Option<i64>,
    },

    /// Ping message for reachability probes.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The operation was applied (or had already been applied).
    Ack {
        request_id: u64,
        remote_id: String,
        version: i64,
    },

    /// The operation is invalid and will never succeed as sent.
    Rejected { request_id: u64, message: String },

    /// The remote record changed since `base_version`.
    Conflict {
        request_id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_id: Option<String>,
        remote_version: i64,
        remote_payload: Value,
    },

    /// The server cannot handle the request right now; try again later.
    Unavailable { request_id: u64, message: String },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error for a message that could not be parsed.
    Error {
        /// Human-readable error description.
        message: String,
    },
}

impl ClientMessage {
    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Request id of an `apply`, or the ping id.
    pub fn request_id(&self) -> u64 {
        match self {
            ClientMessage::Apply { request_id, .. } => *request_id,
            ClientMessage::Ping { id } => *id,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Ack message.
    pub fn ack(request_id: u64, remote_id: impl Into<String>, version: i64) -> Self {
        ServerMessage::Ack {
            request_id,
            remote_id: remote_id.into(),
            version,
        }
    }

    /// Creates a Rejected message.
    pub fn rejected(request_id: u64, message: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            request_id,
            message: message.into(),
        }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// The request this message answers, if it answers one.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::Ack { request_id, .. }
            | ServerMessage::Rejected { request_id, .. }
            | ServerMessage::Conflict { request_id, .. }
            | ServerMessage::Unavailable { request_id, .. } => Some(*request_id),
            ServerMessage::Pong { id } => Some(*id),
            ServerMessage::Error { .. } => None,
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
