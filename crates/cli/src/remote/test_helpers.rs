// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted remote for engine, monitor, and context tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use hse_core::OpKind;

use super::transport::{RemoteAck, RemoteError, RemoteRequest, RemoteResult, RemoteStore};

/// Mock remote that answers from a script, then acknowledges everything.
///
/// Unscripted creates get `rem-<n>` at version 1; unscripted updates and
/// deletes get `base_version + 1`.
pub struct MockRemote {
    script: Mutex<VecDeque<RemoteResult<RemoteAck>>>,
    requests: Mutex<Vec<RemoteRequest>>,
    reachable: AtomicBool,
    next_remote: AtomicU64,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Self {
        MockRemote {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            next_remote: AtomicU64::new(1),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue the answer for the next apply.
    pub fn push(&self, response: RemoteResult<RemoteAck>) {
        self.script.lock().unwrap().push_back(response);
    }

    /// Queue `n` transient failures.
    pub fn push_transient(&self, n: usize) {
        for i in 0..n {
            self.push(Err(RemoteError::Transient(format!("network down ({})", i + 1))));
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every apply take this long.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of applies that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn default_ack(&self, request: &RemoteRequest) -> RemoteAck {
        match (request.kind, &request.remote_id) {
            (OpKind::Create, _) | (_, None) => RemoteAck {
                remote_id: format!("rem-{}", self.next_remote.fetch_add(1, Ordering::SeqCst)),
                version: 1,
            },
            (_, Some(remote_id)) => RemoteAck {
                remote_id: remote_id.clone(),
                version: request.base_version.unwrap_or(0) + 1,
            },
        }
    }
}

impl RemoteStore for MockRemote {
    fn apply(
        &self,
        request: RemoteRequest,
    ) -> Pin<Box<dyn Future<Output = RemoteResult<RemoteAck>> + Send + '_>> {
        Box::pin(async move {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            self.requests.lock().unwrap().push(request.clone());
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let scripted = self.script.lock().unwrap().pop_front();
            let response = scripted.unwrap_or_else(|| Ok(self.default_ack(&request)));

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            response
        })
    }

    fn probe(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async move { self.reachable.load(Ordering::SeqCst) })
    }
}
