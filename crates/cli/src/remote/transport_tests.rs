// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the WebSocket remote against a scripted in-process server.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

type Responder = Arc<dyn Fn(ClientMessage) -> Vec<ServerMessage> + Send + Sync>;

/// Start a WebSocket server answering each client message via `respond`.
async fn start_server(respond: Responder) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut stream) = ws.split();
                while let Some(Ok(Message::Text(text))) = stream.next().await {
                    let msg = ClientMessage::from_json(&text).unwrap();
                    for reply in respond(msg) {
                        let json = reply.to_json().unwrap();
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    format!("ws://{}", addr)
}

fn update_request() -> RemoteRequest {
    RemoteRequest {
        operation_id: 5,
        entity_type: EntityType::Incident,
        kind: OpKind::Update,
        payload: json!({"severity": "high"}),
        remote_id: Some("rem-9".to_string()),
        base_version: Some(2),
    }
}

fn answer_apply_with(
    f: impl Fn(u64) -> ServerMessage + Send + Sync + 'static,
) -> Responder {
    Arc::new(move |msg| match msg {
        ClientMessage::Apply { request_id, .. } => vec![f(request_id)],
        ClientMessage::Ping { id } => vec![ServerMessage::pong(id)],
    })
}

#[tokio::test]
async fn apply_ack_returns_remote_id_and_version() {
    let url = start_server(answer_apply_with(|id| ServerMessage::ack(id, "rem-9", 3))).await;
    let remote = WebSocketRemote::new(url);

    let ack = remote.apply(update_request()).await.unwrap();
    assert_eq!(
        ack,
        RemoteAck {
            remote_id: "rem-9".to_string(),
            version: 3
        }
    );
}

#[tokio::test]
async fn apply_sends_request_fields() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let url = start_server(Arc::new(move |msg: ClientMessage| {
        let id = msg.request_id();
        seen_clone.lock().unwrap().push(msg);
        vec![ServerMessage::ack(id, "rem-9", 3)]
    }))
    .await;

    let remote = WebSocketRemote::new(url);
    remote.apply(update_request()).await.unwrap();

    let seen = seen.lock().unwrap();
    match &seen[0] {
        ClientMessage::Apply {
            operation_id,
            kind,
            remote_id,
            base_version,
            ..
        } => {
            assert_eq!(*operation_id, 5);
            assert_eq!(*kind, OpKind::Update);
            assert_eq!(remote_id.as_deref(), Some("rem-9"));
            assert_eq!(*base_version, Some(2));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn rejected_maps_to_rejected() {
    let url = start_server(answer_apply_with(|id| {
        ServerMessage::rejected(id, "missing location")
    }))
    .await;
    let remote = WebSocketRemote::new(url);

    let err = remote.apply(update_request()).await.unwrap_err();
    assert_eq!(err, RemoteError::Rejected("missing location".to_string()));
}

#[tokio::test]
async fn conflict_carries_remote_state() {
    let url = start_server(answer_apply_with(|id| ServerMessage::Conflict {
        request_id: id,
        remote_id: Some("rem-9".to_string()),
        remote_version: 4,
        remote_payload: json!({"severity": "low"}),
    }))
    .await;
    let remote = WebSocketRemote::new(url);

    match remote.apply(update_request()).await.unwrap_err() {
        RemoteError::Conflict {
            remote_version,
            remote_payload,
            ..
        } => {
            assert_eq!(remote_version, 4);
            assert_eq!(remote_payload, json!({"severity": "low"}));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unavailable_is_transient() {
    let url = start_server(answer_apply_with(|id| ServerMessage::Unavailable {
        request_id: id,
        message: "maintenance".to_string(),
    }))
    .await;
    let remote = WebSocketRemote::new(url);

    let err = remote.apply(update_request()).await.unwrap_err();
    assert_eq!(err, RemoteError::Transient("maintenance".to_string()));
}

#[tokio::test]
async fn stale_responses_are_skipped() {
    // Server first replays an answer for an old request, then the real one
    let url = start_server(Arc::new(|msg: ClientMessage| {
        let id = msg.request_id();
        vec![
            ServerMessage::ack(id + 100, "rem-stale", 9),
            ServerMessage::ack(id, "rem-1", 1),
        ]
    }))
    .await;

    let remote = WebSocketRemote::new(url);
    let ack = remote.apply(update_request()).await.unwrap();
    assert_eq!(ack.remote_id, "rem-1");
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = WebSocketRemote::new(format!("ws://{}", addr));
    let err = remote.apply(update_request()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Transient(_)));
    assert!(!remote.probe().await);
}

#[tokio::test]
async fn probe_succeeds_against_live_server() {
    let url = start_server(answer_apply_with(|id| ServerMessage::ack(id, "rem-1", 1))).await;
    let remote = WebSocketRemote::new(url.clone());
    assert_eq!(remote.url(), url);
    assert!(remote.probe().await);
    // Connection is reused for the next call
    assert!(remote.apply(update_request()).await.is_ok());
}
