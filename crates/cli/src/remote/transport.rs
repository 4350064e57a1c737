// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the remote system of record.
//!
//! Provides a trait-based layer that enables:
//! - A real WebSocket client for production
//! - Scripted mock remotes for unit testing

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use hse_core::protocol::{ClientMessage, ServerMessage};
use hse_core::{EntityType, OpKind, OperationId};

/// A single operation as sent to the remote.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub operation_id: OperationId,
    pub entity_type: EntityType,
    pub kind: OpKind,
    pub payload: Value,
    /// Required for update and delete.
    pub remote_id: Option<String>,
    /// Version the local change is based on.
    pub base_version: Option<i64>,
}

/// Successful application of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAck {
    pub remote_id: String,
    pub version: i64,
}

/// Why the remote did not apply an operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// Network failure, timeout, or temporary unavailability. Retried.
    #[error("transient: {0}")]
    Transient(String),

    /// Validation or authorization failure. Never retried.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The remote record moved past the version the change was based on.
    #[error("conflict: remote is at version {remote_version}")]
    Conflict {
        remote_id: Option<String>,
        remote_version: i64,
        remote_payload: Value,
    },
}

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote system of record.
///
/// Implementations must be safe to share between the sync engine and the
/// connectivity probe.
pub trait RemoteStore: Send + Sync {
    /// Apply one operation.
    fn apply(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<RemoteAck>> + Send + '_>>;

    /// Check whether the remote is reachable right now.
    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WebSocketConnection {
    async fn open(url: &str) -> RemoteResult<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RemoteError::Transient(format!("connection failed: {e}")))?;
        let (sink, stream) = ws_stream.split();
        Ok(WebSocketConnection { sink, stream })
    }

    async fn send(&mut self, msg: &ClientMessage) -> RemoteResult<()> {
        let json = msg
            .to_json()
            .map_err(|e| RemoteError::Rejected(format!("cannot encode request: {e}")))?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| RemoteError::Transient(format!("send failed: {e}")))?;
        // Flush to detect a broken connection now rather than on the next send
        self.sink
            .flush()
            .await
            .map_err(|e| RemoteError::Transient(format!("send failed: {e}")))
    }

    /// Wait for the server message answering `request_id`.
    ///
    /// Stale answers to abandoned (timed out) requests are skipped.
    async fn recv_for(&mut self, request_id: u64) -> RemoteResult<ServerMessage> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = ServerMessage::from_json(&text).map_err(|e| {
                        RemoteError::Transient(format!("malformed server message: {e}"))
                    })?;
                    match msg.request_id() {
                        Some(id) if id == request_id => return Ok(msg),
                        None => return Ok(msg),
                        Some(other) => {
                            debug!("skipping stale response for request {}", other);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(RemoteError::Transient("connection closed".to_string()));
                }
                Some(Ok(_)) => {
                    // Ignore ping/pong and binary frames
                    continue;
                }
                Some(Err(e)) => {
                    return Err(RemoteError::Transient(format!("receive failed: {e}")));
                }
            }
        }
    }
}

/// WebSocket client for the remote system of record.
///
/// Connects lazily and reconnects on the next call after any failure.
pub struct WebSocketRemote {
    url: String,
    connection: Mutex<Option<WebSocketConnection>>,
    next_request_id: AtomicU64,
}

impl WebSocketRemote {
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketRemote {
            url: url.into(),
            connection: Mutex::new(None),
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one message and wait for its answer on a shared connection.
    async fn round_trip(&self, msg: ClientMessage) -> RemoteResult<ServerMessage> {
        let mut slot = self.connection.lock().await;
        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => WebSocketConnection::open(&self.url).await?,
        };

        let request_id = msg.request_id();
        conn.send(&msg).await?;
        let response = conn.recv_for(request_id).await?;

        // Only a healthy connection goes back into the slot
        *slot = Some(conn);
        Ok(response)
    }
}

impl RemoteStore for WebSocketRemote {
    fn apply(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<RemoteAck>> + Send + '_>> {
        Box::pin(async move {
            let msg = ClientMessage::Apply {
                request_id: self.next_id(),
                operation_id: request.operation_id,
                entity_type: request.entity_type,
                kind: request.kind,
                payload: request.payload,
                remote_id: request.remote_id,
                base_version: request.base_version,
            };

            match self.round_trip(msg).await? {
                ServerMessage::Ack {
                    remote_id, version, ..
                } => Ok(RemoteAck { remote_id, version }),
                ServerMessage::Rejected { message, .. } => Err(RemoteError::Rejected(message)),
                ServerMessage::Conflict {
                    remote_id,
                    remote_version,
                    remote_payload,
                    ..
                } => Err(RemoteError::Conflict {
                    remote_id,
                    remote_version,
                    remote_payload,
                }),
                ServerMessage::Unavailable { message, .. } => Err(RemoteError::Transient(message)),
                ServerMessage::Error { message } => Err(RemoteError::Rejected(message)),
                ServerMessage::Pong { .. } => Err(RemoteError::Transient(
                    "unexpected pong in reply to apply".to_string(),
                )),
            }
        })
    }

    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move {
            let ping = ClientMessage::ping(self.next_id());
            match self.round_trip(ping).await {
                Ok(ServerMessage::Pong { .. }) => true,
                Ok(other) => {
                    debug!("unexpected probe reply: {:?}", other);
                    false
                }
                Err(e) => {
                    debug!("probe failed: {}", e);
                    false
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
