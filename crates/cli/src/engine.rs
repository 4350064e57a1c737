// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync engine: drains the operation queue against the remote system of record.
//!
//! ```text
//!   run_once
//!      │ claim run slot, check connectivity
//!      ▼
//!   next_batch ──► for each op: InFlight ──► RemoteStore::apply
//!                                               │
//!        ┌──────────────┬───────────────┬───────┴───────┐
//!        ▼              ▼               ▼               ▼
//!       Ack         Transient        Rejected        Conflict
//!    Done, record   backoff or       Failed        policy: superseded
//!    confirmed      Failed (exhausted)             or rebased resend
//! ```
//!
//! Remote failures never surface as [`Error`]s: they become queue status
//! changes plus a [`RunReport`]. Only local storage failures propagate. An
//! operation whose status was changed by someone else while it was on the
//! wire is left alone; its answer is dropped.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use hse_core::{
    ClockSource, LocalStore, OpKind, OpStatus, Operation, OperationId, OperationQueue,
    REJECTED_PREFIX,
};

use crate::backoff::Backoff;
use crate::config::{Config, ConflictPolicy};
use crate::error::Result;
use crate::remote::{RemoteAck, RemoteError, RemoteRequest, RemoteStore};
use crate::state::SyncState;

/// The local store, shared between the engine and the UI-facing context.
pub type SharedStore = Arc<Mutex<LocalStore>>;

/// Lock the store, recovering from a poisoned lock.
///
/// Every store write is a SQLite savepoint, so a panic mid-write leaves no
/// partial state behind.
pub(crate) fn lock_store(store: &Mutex<LocalStore>) -> MutexGuard<'_, LocalStore> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Engine tuning, usually taken from `[sync]` and `[remote]` in config.toml.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub batch_size: usize,
    /// Failed attempts allowed before an operation is marked failed.
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub request_timeout: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        EngineConfig {
            batch_size: config.sync.batch_size,
            max_attempts: config.sync.max_attempts,
            backoff: config.sync.backoff(),
            request_timeout: config.remote.request_timeout(),
            conflict_policy: config.sync.conflict_policy,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::from_config(&Config::default())
    }
}

/// Why a run did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

/// Result of a single pass over the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Completed(RunReport),
}

/// What happened to each operation sent during one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
    pub superseded: usize,
    /// Transient failures scheduled for a later attempt.
    pub retrying: usize,
    /// Conflicts resolved local-wins, resent on the next pass.
    pub rebased: usize,
    /// Operations that ran out of attempts.
    pub exhausted: Vec<OperationId>,
    /// Operations refused by the remote, with its message.
    pub rejected: Vec<(OperationId, String)>,
}

impl RunReport {
    /// Number of operations handed to the remote.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed + self.superseded + self.retrying + self.rebased
    }

    /// True if any operation reached a final state or is due again right away.
    pub fn made_progress(&self) -> bool {
        self.succeeded + self.failed + self.superseded + self.rebased > 0
    }
}

/// Totals across the passes of a [`SyncEngine::sync_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub superseded: usize,
}

impl SyncSummary {
    fn absorb(&mut self, report: &RunReport) {
        self.succeeded += report.succeeded;
        self.failed += report.failed;
        self.superseded += report.superseded;
    }
}

/// Drains the queue. One run at a time, enforced through [`SyncState`].
pub struct SyncEngine {
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    state: Arc<SyncState>,
    config: EngineConfig,
    clock: Arc<dyn ClockSource>,
}

impl SyncEngine {
    pub fn new(
        store: SharedStore,
        remote: Arc<dyn RemoteStore>,
        state: Arc<SyncState>,
        config: EngineConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        SyncEngine {
            store,
            remote,
            state,
            config,
            clock,
        }
    }

    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, LocalStore> {
        lock_store(&self.store)
    }

    /// Recount pending and failed operations into [`SyncState`].
    pub fn refresh_counts(&self) -> Result<()> {
        let store = self.lock();
        let pending = store.count_unresolved()?;
        let failed = store.count_failed()?;
        self.state.set_counts(pending, failed);
        Ok(())
    }

    /// Send one batch of due operations.
    ///
    /// Skipped if offline or if another run holds the run slot.
    pub async fn run_once(&self) -> Result<RunOutcome> {
        let Some(_guard) = self.state.try_begin() else {
            debug!("sync run already in progress, skipping");
            return Ok(RunOutcome::Skipped(SkipReason::AlreadyRunning));
        };
        if !self.state.is_online() {
            debug!("offline, skipping sync run");
            return Ok(RunOutcome::Skipped(SkipReason::Offline));
        }

        let batch = {
            let mut store = self.lock();
            OperationQueue::new(&mut store).next_batch(self.config.batch_size, self.clock.now())?
        };
        if !batch.is_empty() {
            debug!(operations = batch.len(), "starting sync run");
        }

        let mut report = RunReport::default();
        for op in batch {
            self.deliver(op, &mut report).await?;
            self.refresh_counts()?;
        }

        self.refresh_counts()?;
        self.state.mark_synced(self.clock.now());
        if report.attempted() > 0 {
            info!(
                succeeded = report.succeeded,
                failed = report.failed,
                superseded = report.superseded,
                retrying = report.retrying,
                "sync run complete"
            );
        }
        Ok(RunOutcome::Completed(report))
    }

    /// Run passes until one makes no progress.
    ///
    /// Returns zeros when skipped: the caller learns nothing was sent.
    pub async fn sync_all(&self) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        loop {
            match self.run_once().await? {
                RunOutcome::Skipped(reason) => {
                    debug!(?reason, "sync_all stopped");
                    break;
                }
                RunOutcome::Completed(report) => {
                    summary.absorb(&report);
                    if !report.made_progress() {
                        break;
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn deliver(&self, op: Operation, report: &mut RunReport) -> Result<()> {
        let request = {
            let mut store = self.lock();
            match store.begin_attempt(op.id) {
                Ok(_) => {}
                Err(hse_core::Error::InvalidTransition { from, .. }) => {
                    debug!(op = op.id, status = %from, "operation no longer pending, skipping");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
            match build_request(&store, &op)? {
                Ok(request) => request,
                Err(message) => {
                    error!(op = op.id, local_id = %op.local_id, "{message}");
                    store.fail(op.id, &message)?;
                    store.refresh_state(&op.local_id)?;
                    report.failed += 1;
                    report.rejected.push((op.id, message));
                    return Ok(());
                }
            }
        };

        debug!(op = op.id, kind = %op.kind, local_id = %op.local_id, "sending operation");
        let result =
            match tokio::time::timeout(self.config.request_timeout, self.remote.apply(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Transient(format!(
                    "no answer within {}s",
                    self.config.request_timeout.as_secs()
                ))),
            };

        let now = self.clock.now();
        let mut store = self.lock();
        if !still_in_flight(&store, op.id)? {
            warn!(op = op.id, local_id = %op.local_id, "operation changed while in flight, answer dropped");
            return Ok(());
        }
        match result {
            Ok(ack) => self.on_ack(&mut store, &op, &ack, report)?,
            Err(RemoteError::Transient(message)) => {
                self.on_transient(&mut store, &op, &message, now, report)?
            }
            Err(RemoteError::Rejected(message)) => {
                warn!(op = op.id, local_id = %op.local_id, "rejected by remote: {message}");
                store.fail(op.id, &format!("{REJECTED_PREFIX}{message}"))?;
                report.failed += 1;
                report.rejected.push((op.id, message));
            }
            Err(RemoteError::Conflict {
                remote_id,
                remote_version,
                remote_payload,
            }) => {
                let conflict = Conflict {
                    remote_id,
                    version: remote_version,
                    payload: remote_payload,
                };
                self.on_conflict(&mut store, &op, conflict, now, report)?
            }
        }
        store.refresh_state(&op.local_id)?;
        Ok(())
    }

    fn on_ack(
        &self,
        store: &mut LocalStore,
        op: &Operation,
        ack: &RemoteAck,
        report: &mut RunReport,
    ) -> Result<()> {
        let applied = store.atomically(|store| {
            let local_id = op.local_id.as_str();
            match op.kind {
                OpKind::Create => {
                    if store.record_exists(local_id)? {
                        store.set_remote_id(local_id, &ack.remote_id)?;
                        store.set_version(local_id, ack.version)?;
                    }
                }
                OpKind::Update => {
                    if store.record_exists(local_id)? {
                        store.set_version(local_id, ack.version)?;
                    }
                }
                OpKind::Delete => {
                    store.delete(local_id)?;
                }
            }
            store.complete(op.id, false)?;
            Ok(())
        });

        match applied {
            Ok(()) => {
                debug!(op = op.id, remote_id = %ack.remote_id, version = ack.version, "acknowledged");
                report.succeeded += 1;
            }
            Err(e) => {
                // The remote accepted it but the acknowledgement does not fit the record
                error!(op = op.id, local_id = %op.local_id, "cannot apply acknowledgement: {e}");
                let message = format!("cannot apply acknowledgement: {e}");
                store.fail(op.id, &message)?;
                report.failed += 1;
                report.rejected.push((op.id, message));
            }
        }
        Ok(())
    }

    fn on_transient(
        &self,
        store: &mut LocalStore,
        op: &Operation,
        message: &str,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> Result<()> {
        let attempts = op.attempts + 1;
        if attempts > self.config.max_attempts {
            warn!(op = op.id, attempts, "sync exhausted: {message}");
            store.fail(
                op.id,
                &format!("sync exhausted after {attempts} attempts: {message}"),
            )?;
            report.failed += 1;
            report.exhausted.push(op.id);
            return Ok(());
        }

        let delay = self.config.backoff.delay(attempts);
        let due = now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        debug!(op = op.id, attempts, delay_ms = delay.as_millis() as u64, "transient failure: {message}");
        store.retry_later(op.id, due, message)?;
        report.retrying += 1;
        Ok(())
    }

    fn on_conflict(
        &self,
        store: &mut LocalStore,
        op: &Operation,
        conflict: Conflict,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> Result<()> {
        let local_id = op.local_id.as_str();
        match self.config.conflict_policy {
            ConflictPolicy::RemoteWins => {
                store.atomically(|store| {
                    if let Some(record) = store.get_including_deleted(local_id)? {
                        if let (None, Some(remote_id)) = (&record.remote_id, &conflict.remote_id) {
                            store.set_remote_id(local_id, remote_id)?;
                        }
                        let later_changes = store
                            .operations_for(local_id)?
                            .iter()
                            .any(|other| other.id != op.id && other.is_unresolved());
                        if later_changes {
                            // Newer local edits will be sent on top of the remote version
                            store.set_version(local_id, conflict.version)?;
                        } else {
                            store.overwrite_from_remote(
                                local_id,
                                &conflict.payload,
                                conflict.version,
                                now,
                            )?;
                        }
                    }
                    store.complete(op.id, true)?;
                    Ok(())
                })?;
                info!(
                    op = op.id,
                    local_id,
                    remote_version = conflict.version,
                    "conflict: local change superseded by remote"
                );
                report.superseded += 1;
            }
            ConflictPolicy::LocalWins => {
                let attempts = op.attempts + 1;
                if attempts > self.config.max_attempts {
                    warn!(op = op.id, attempts, "sync exhausted on repeated conflicts");
                    store.fail(
                        op.id,
                        &format!("sync exhausted after {attempts} attempts: version conflict"),
                    )?;
                    report.failed += 1;
                    report.exhausted.push(op.id);
                    return Ok(());
                }
                store.atomically(|store| {
                    if let Some(record) = store.get_including_deleted(local_id)? {
                        if let (None, Some(remote_id)) = (&record.remote_id, &conflict.remote_id) {
                            store.set_remote_id(local_id, remote_id)?;
                        }
                        store.set_version(local_id, conflict.version)?;
                    }
                    store.retry_later(
                        op.id,
                        now,
                        &format!("conflict: rebased on remote version {}", conflict.version),
                    )?;
                    Ok(())
                })?;
                info!(
                    op = op.id,
                    local_id,
                    remote_version = conflict.version,
                    "conflict: local change rebased for resend"
                );
                report.rebased += 1;
            }
        }
        Ok(())
    }
}

/// Returns true if the operation is still the attempt this engine started.
fn still_in_flight(store: &LocalStore, id: OperationId) -> Result<bool> {
    match store.get_operation(id) {
        Ok(op) => Ok(op.status == OpStatus::InFlight),
        Err(hse_core::Error::OperationNotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remote state reported with a version mismatch.
struct Conflict {
    remote_id: Option<String>,
    version: i64,
    payload: Value,
}

/// Build the request for an operation from the record's current remote state.
///
/// The inner `Err` carries the reason an update or delete cannot be sent.
fn build_request(
    store: &LocalStore,
    op: &Operation,
) -> Result<std::result::Result<RemoteRequest, String>> {
    let record = store.get_including_deleted(&op.local_id)?;
    let remote_id = record
        .as_ref()
        .and_then(|r| r.remote_id.clone())
        .or_else(|| op.remote_id.clone());
    let base_version = record.as_ref().map(|r| r.version).filter(|v| *v > 0);

    let payload = match op.kind {
        OpKind::Delete => Value::Null,
        OpKind::Create | OpKind::Update => op.payload.clone(),
    };

    if op.kind != OpKind::Create && remote_id.is_none() {
        return Ok(Err(format!(
            "{} of {} has no remote id: its create was never acknowledged",
            op.kind, op.local_id
        )));
    }

    Ok(Ok(RemoteRequest {
        operation_id: op.id,
        entity_type: op.entity_type,
        kind: op.kind,
        payload,
        remote_id: if op.kind == OpKind::Create { None } else { remote_id },
        base_version: if op.kind == OpKind::Create { None } else { base_version },
    }))
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
