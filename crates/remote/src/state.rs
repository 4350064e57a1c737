// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Holds the versioned records of the system of record in memory, together
//! with the acknowledgement of every applied operation so a re-delivery is
//! answered without being applied twice.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use hse_core::protocol::ServerMessage;
use hse_core::{EntityType, OpKind, OperationId};

/// A record as the remote knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub remote_id: String,
    pub entity_type: EntityType,
    pub version: i64,
    pub payload: Value,
}

/// One `apply` request, as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub request_id: u64,
    pub operation_id: OperationId,
    pub entity_type: EntityType,
    pub kind: OpKind,
    pub payload: Value,
    pub remote_id: Option<String>,
    pub base_version: Option<i64>,
}

impl ApplyRequest {
    /// Everything but the request id and base version. A re-delivery carries
    /// the same fingerprint as the original.
    fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            entity_type: self.entity_type,
            kind: self.kind,
            remote_id: self.remote_id.clone(),
            payload: self.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fingerprint {
    entity_type: EntityType,
    kind: OpKind,
    remote_id: Option<String>,
    payload: Value,
}

#[derive(Debug, Clone)]
struct Applied {
    fingerprint: Fingerprint,
    remote_id: String,
    version: i64,
}

/// Shared server state.
#[derive(Clone, Default)]
pub struct ServerState {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<String, RemoteRecord>,
    /// Acknowledged operations, by client operation id.
    applied: HashMap<OperationId, Applied>,
    next_id: u64,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one operation and returns the answer for the client.
    ///
    /// Create assigns `rem-<n>` at version 1. Update and delete must name an
    /// existing record and, when `base_version` is given, match its current
    /// version. Every accepted change bumps the version.
    pub async fn apply(&self, req: ApplyRequest) -> ServerMessage {
        let mut inner = self.inner.lock().await;

        let fingerprint = req.fingerprint();
        if let Some(applied) = inner.applied.get(&req.operation_id) {
            if applied.fingerprint == fingerprint {
                return ServerMessage::ack(req.request_id, applied.remote_id.clone(), applied.version);
            }
        }

        let result = match req.kind {
            OpKind::Create => inner.create(&req),
            OpKind::Update => inner.update(&req),
            OpKind::Delete => inner.delete(&req),
        };

        match result {
            Ok((remote_id, version)) => {
                inner.applied.insert(
                    req.operation_id,
                    Applied {
                        fingerprint,
                        remote_id: remote_id.clone(),
                        version,
                    },
                );
                ServerMessage::ack(req.request_id, remote_id, version)
            }
            Err(answer) => answer,
        }
    }

    /// Current state of a record, if it exists.
    #[cfg(test)]
    pub async fn record(&self, remote_id: &str) -> Option<RemoteRecord> {
        self.inner.lock().await.records.get(remote_id).cloned()
    }

    #[cfg(test)]
    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Changes a record as if another client had edited it.
    ///
    /// Returns the new version, or `None` if the record does not exist.
    #[cfg(test)]
    pub async fn edit(&self, remote_id: &str, payload: Value) -> Option<i64> {
        let mut inner = self.inner.lock().await;
        let record = inner.records.get_mut(remote_id)?;
        record.payload = payload;
        record.version += 1;
        Some(record.version)
    }
}

type Outcome = Result<(String, i64), ServerMessage>;

impl Inner {
    fn create(&mut self, req: &ApplyRequest) -> Outcome {
        require_object(req)?;
        self.next_id += 1;
        let remote_id = format!("rem-{}", self.next_id);
        self.records.insert(
            remote_id.clone(),
            RemoteRecord {
                remote_id: remote_id.clone(),
                entity_type: req.entity_type,
                version: 1,
                payload: req.payload.clone(),
            },
        );
        Ok((remote_id, 1))
    }

    fn update(&mut self, req: &ApplyRequest) -> Outcome {
        require_object(req)?;
        let record = self.existing(req)?;
        record.payload = req.payload.clone();
        record.version += 1;
        Ok((record.remote_id.clone(), record.version))
    }

    fn delete(&mut self, req: &ApplyRequest) -> Outcome {
        let record = self.existing(req)?;
        let answer = (record.remote_id.clone(), record.version + 1);
        self.records.remove(&answer.0);
        Ok(answer)
    }

    /// The record an update or delete targets, after the version check.
    fn existing(&mut self, req: &ApplyRequest) -> Result<&mut RemoteRecord, ServerMessage> {
        let remote_id = req.remote_id.as_deref().ok_or_else(|| {
            ServerMessage::rejected(req.request_id, format!("{} requires a remote_id", req.kind))
        })?;
        let record = self.records.get_mut(remote_id).ok_or_else(|| {
            ServerMessage::rejected(req.request_id, format!("record not found: {}", remote_id))
        })?;
        if record.entity_type != req.entity_type {
            return Err(ServerMessage::rejected(
                req.request_id,
                format!("{} is a {}, not a {}", remote_id, record.entity_type, req.entity_type),
            ));
        }
        match req.base_version {
            Some(base) if base != record.version => Err(ServerMessage::Conflict {
                request_id: req.request_id,
                remote_id: Some(record.remote_id.clone()),
                remote_version: record.version,
                remote_payload: record.payload.clone(),
            }),
            _ => Ok(record),
        }
    }
}

fn require_object(req: &ApplyRequest) -> Result<(), ServerMessage> {
    if req.payload.is_object() {
        Ok(())
    } else {
        Err(ServerMessage::rejected(
            req.request_id,
            "payload must be a JSON object",
        ))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
