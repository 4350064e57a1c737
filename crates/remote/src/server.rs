// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection is served by its own task; every text frame is one
//! [`ClientMessage`] answered by exactly one [`ServerMessage`].

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use hse_core::protocol::{ClientMessage, ServerMessage};

use crate::state::{ApplyRequest, ServerState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<(), BoxError> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), BoxError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    debug!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let response = handle_client_message(&text, &state).await;
                ws_sink.send(Message::Text(response.to_json()?.into())).await?;
            }
            Ok(Message::Close(_)) => {
                debug!("Client {} disconnected", peer_addr);
                break;
            }
            Ok(Message::Ping(data)) => {
                ws_sink.send(Message::Pong(data)).await?;
            }
            Ok(_) => {
                // Ignore other message types (Binary, Pong, Frame)
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    debug!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process a client message and return the response.
pub(crate) async fn handle_client_message(text: &str, state: &ServerState) -> ServerMessage {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => return ServerMessage::error(format!("invalid message: {}", e)),
    };
    debug!("Received message: {:?}", msg);

    match msg {
        ClientMessage::Apply {
            request_id,
            operation_id,
            entity_type,
            kind,
            payload,
            remote_id,
            base_version,
        } => {
            let response = state
                .apply(ApplyRequest {
                    request_id,
                    operation_id,
                    entity_type,
                    kind,
                    payload,
                    remote_id,
                    base_version,
                })
                .await;
            match &response {
                ServerMessage::Ack {
                    remote_id, version, ..
                } => info!(operation_id, %kind, %entity_type, remote_id, version, "applied"),
                ServerMessage::Conflict { remote_version, .. } => {
                    info!(operation_id, %kind, remote_version, "conflict")
                }
                ServerMessage::Rejected { message, .. } => {
                    info!(operation_id, %kind, message, "rejected")
                }
                _ => {}
            }
            response
        }

        ClientMessage::Ping { id } => {
            debug!("Ping received: {}", id);
            ServerMessage::pong(id)
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
