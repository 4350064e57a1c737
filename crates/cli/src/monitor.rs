// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity tracking and scheduled sync.
//!
//! Background work runs as [`ScheduledTask`]s: a spawned tokio task paired
//! with a cancellation token. Timers use `tokio::time`, so tests drive them
//! with a paused clock instead of waiting.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{RunOutcome, SyncEngine};
use crate::remote::RemoteStore;

/// Online/offline signal with change notifications.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Connectivity { tx: Arc::new(tx) }
    }

    /// Record the current state. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "connectivity changed");
        }
        changed
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// A slot for one background task.
///
/// Spawning into an occupied slot cancels the previous task first. Dropping
/// the slot cancels whatever is running.
#[derive(Default)]
pub struct ScheduledTask {
    running: Mutex<Option<Running>>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn `task`, replacing anything already running in this slot.
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(task(token.clone()));
        let previous = self.slot().replace(Running { token, handle });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Cancel the task. Returns false if nothing was scheduled.
    ///
    /// Work the task already started is not interrupted.
    pub fn stop(&self) -> bool {
        match self.slot().take() {
            Some(running) => {
                running.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the task and wait for it to finish.
    pub async fn stop_and_wait(&self) {
        let running = self.slot().take();
        if let Some(running) = running {
            running.token.cancel();
            if let Err(e) = running.handle.await {
                warn!("scheduled task ended abnormally: {e}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(running) = self.slot().take() {
            running.token.cancel();
        }
    }
}

/// Periodic and reconnect-triggered sync.
pub struct AutoSync {
    engine: Arc<SyncEngine>,
    task: ScheduledTask,
}

impl AutoSync {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        AutoSync {
            engine,
            task: ScheduledTask::new(),
        }
    }

    /// Run a sync pass every `interval` and whenever connectivity comes back.
    ///
    /// Calling again replaces the running schedule.
    pub fn start(&self, interval: Duration) {
        let engine = Arc::clone(&self.engine);
        self.task
            .spawn(move |token| auto_sync_loop(engine, interval, token));
        info!(interval_secs = interval.as_secs(), "auto-sync started");
    }

    /// Stop scheduling runs. A run already in progress finishes.
    pub fn stop(&self) {
        if self.task.stop() {
            info!("auto-sync stopped");
        }
    }

    /// Stop scheduling runs and wait for an in-progress run to finish.
    pub async fn stop_and_wait(&self) {
        self.task.stop_and_wait().await;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

async fn auto_sync_loop(engine: Arc<SyncEngine>, interval: Duration, token: CancellationToken) {
    let mut online_rx = engine.state().connectivity().subscribe();
    let mut was_online = *online_rx.borrow_and_update();

    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => trigger(&engine, "timer").await,
            changed = online_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *online_rx.borrow_and_update();
                if online && !was_online {
                    trigger(&engine, "back online").await;
                }
                was_online = online;
            }
        }
    }
    debug!("auto-sync loop exited");
}

async fn trigger(engine: &SyncEngine, reason: &str) {
    match engine.run_once().await {
        Ok(RunOutcome::Completed(report)) => {
            debug!(reason, attempted = report.attempted(), "auto-sync run finished")
        }
        Ok(RunOutcome::Skipped(skip)) => debug!(reason, ?skip, "auto-sync run skipped"),
        Err(e) => warn!(reason, "auto-sync run failed: {e}"),
    }
}

/// Probe the remote once and record the result.
pub async fn probe_once(
    remote: &dyn RemoteStore,
    connectivity: &Connectivity,
    timeout: Duration,
) -> bool {
    let online = tokio::time::timeout(timeout, remote.probe())
        .await
        .unwrap_or(false);
    connectivity.set_online(online);
    online
}

/// Periodically checks whether the remote is reachable.
///
/// Stands in for the platform's online/offline signal.
pub struct ConnectivityProbe {
    remote: Arc<dyn RemoteStore>,
    connectivity: Connectivity,
    timeout: Duration,
    task: ScheduledTask,
}

impl ConnectivityProbe {
    pub fn new(remote: Arc<dyn RemoteStore>, connectivity: Connectivity, timeout: Duration) -> Self {
        ConnectivityProbe {
            remote,
            connectivity,
            timeout,
            task: ScheduledTask::new(),
        }
    }

    pub fn start(&self, interval: Duration) {
        let remote = Arc::clone(&self.remote);
        let connectivity = self.connectivity.clone();
        let timeout = self.timeout;
        self.task.spawn(move |token| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        probe_once(remote.as_ref(), &connectivity, timeout).await;
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.task.stop();
    }

    pub async fn stop_and_wait(&self) {
        self.task.stop_and_wait().await;
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
