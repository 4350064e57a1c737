// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The UI-facing surface of the offline sync subsystem.
//!
//! A [`SyncContext`] is built once at startup and owns everything the
//! subsystem needs: the local store, the sync engine and its state, and the
//! background tasks. [`SyncContext::shutdown`] tears it all down.
//!
//! Several contexts may open the same state directory. The first one takes
//! an exclusive lock on `sync.lock` and is the only one that recovers
//! interrupted operations and talks to the remote; the others read and queue
//! local changes.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use hse_core::{
    Appended, ClockSource, EntityType, LocalStore, OpKind, Operation, OperationQueue, Record,
    SystemClock,
};

use crate::config::{db_path, sync_lock_path, Config};
use crate::engine::{lock_store, EngineConfig, SharedStore, SyncEngine, SyncSummary};
use crate::error::{Error, Result};
use crate::id::generate_unique_id;
use crate::monitor::{probe_once, AutoSync, Connectivity, ConnectivityProbe};
use crate::remote::RemoteStore;
use crate::state::{SyncState, SyncStatus};

/// How to build a [`SyncContext`].
pub struct ContextOptions {
    /// Directory holding `store.db`. `None` keeps everything in memory.
    pub state_dir: Option<PathBuf>,
    pub config: Config,
    pub clock: Arc<dyn ClockSource>,
}

impl ContextOptions {
    pub fn new(config: Config) -> Self {
        ContextOptions {
            state_dir: None,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(state_dir.into());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }
}

pub struct SyncContext {
    store: SharedStore,
    engine: Arc<SyncEngine>,
    remote: Arc<dyn RemoteStore>,
    auto_sync: AutoSync,
    probe: ConnectivityProbe,
    clock: Arc<dyn ClockSource>,
    config: Config,
    /// Where the store lives, `None` when it is in memory.
    state_dir: Option<PathBuf>,
    /// Held while this context drains the queue of a durable store.
    sync_lock: Option<File>,
}

impl SyncContext {
    /// Open the store, recover from a crash, and check connectivity.
    ///
    /// If the store file cannot be opened the context keeps working on a
    /// volatile in-memory store; this is logged once, here. Recovery only
    /// runs when no other context holds the state directory's sync lock.
    pub async fn init(options: ContextOptions, remote: Arc<dyn RemoteStore>) -> Result<Self> {
        let ContextOptions {
            state_dir,
            config,
            clock,
        } = options;

        let mut store = match &state_dir {
            Some(dir) => match LocalStore::open(&db_path(dir)) {
                Ok(store) => store,
                Err(hse_core::Error::StorageUnavailable(reason)) => {
                    warn!("local storage unavailable, changes will not survive a restart: {reason}");
                    LocalStore::open_in_memory()?
                }
                Err(e) => return Err(e.into()),
            },
            None => LocalStore::open_in_memory()?,
        };
        let state_dir = state_dir.filter(|_| store.is_durable());

        let sync_lock = match &state_dir {
            Some(dir) => try_lock_sync(dir)?,
            None => None,
        };
        if state_dir.is_none() || sync_lock.is_some() {
            let recovered = OperationQueue::new(&mut store).recover()?;
            if recovered > 0 {
                info!(recovered, "re-queued operations interrupted by a restart");
            }
        } else {
            debug!("another process is syncing this store, skipping recovery");
        }

        let connectivity = Connectivity::new(false);
        let state = Arc::new(SyncState::new(connectivity.clone()));
        let store: SharedStore = Arc::new(Mutex::new(store));
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(&store),
            Arc::clone(&remote),
            state,
            EngineConfig::from_config(&config),
            Arc::clone(&clock),
        ));
        engine.refresh_counts()?;

        let timeout = config.remote.request_timeout();
        probe_once(remote.as_ref(), &connectivity, timeout).await;

        Ok(SyncContext {
            auto_sync: AutoSync::new(Arc::clone(&engine)),
            probe: ConnectivityProbe::new(Arc::clone(&remote), connectivity, timeout),
            store,
            engine,
            remote,
            clock,
            config,
            state_dir,
            sync_lock,
        })
    }

    /// Returns true if this context may send operations to the remote.
    ///
    /// False while another context holds the sync lock of the same state
    /// directory.
    pub fn can_sync(&self) -> bool {
        self.state_dir.is_none() || self.sync_lock.is_some()
    }

    fn ensure_can_sync(&self) -> Result<()> {
        match &self.state_dir {
            Some(dir) if self.sync_lock.is_none() => {
                Err(Error::SyncLocked(dir.display().to_string()))
            }
            _ => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalStore> {
        lock_store(&self.store)
    }

    /// Apply a local change atomically, then refresh the counters.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut LocalStore) -> hse_core::Result<T>,
    ) -> Result<T> {
        let value = {
            let mut store = self.lock();
            store.atomically(f)?
        };
        self.engine.refresh_counts()?;
        Ok(value)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns false if the context fell back to an in-memory store.
    pub fn is_durable(&self) -> bool {
        self.lock().is_durable()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Local changes
    // ─────────────────────────────────────────────────────────────────────

    /// Save a new record locally and queue its creation.
    pub fn create(&self, entity_type: EntityType, payload: Value) -> Result<Record> {
        ensure_object(&payload)?;
        let now = self.clock.now();
        let record = self.mutate(|store| {
            let local_id = generate_unique_id(entity_type, &now, |id| store.record_exists(id))?;
            let record = Record::new(local_id, entity_type, payload.clone(), now);
            store.put(&record)?;
            OperationQueue::new(store).append(
                OpKind::Create,
                entity_type,
                &record.local_id,
                payload,
                now,
            )?;
            Ok(record)
        })?;
        debug!(local_id = %record.local_id, %entity_type, "record created");
        Ok(record)
    }

    /// Replace a record's contents locally and queue the update.
    pub fn update(&self, local_id: &str, payload: Value) -> Result<Record> {
        ensure_object(&payload)?;
        let now = self.clock.now();
        let record = self.mutate(|store| {
            let mut record = store
                .get(local_id)?
                .ok_or_else(|| hse_core::Error::RecordNotFound(local_id.to_string()))?;
            record.payload = payload.clone();
            record.updated_at = now;
            store.put(&record)?;
            OperationQueue::new(store).append(
                OpKind::Update,
                record.entity_type,
                local_id,
                payload,
                now,
            )?;
            store.refresh_state(local_id)?;
            store
                .get(local_id)?
                .ok_or_else(|| hse_core::Error::RecordNotFound(local_id.to_string()))
        })?;
        debug!(local_id, "record updated");
        Ok(record)
    }

    /// Delete a record locally and queue the deletion.
    ///
    /// A record the remote never saw disappears right away, together with its
    /// queued operations ([`Appended::Collapsed`]).
    pub fn delete(&self, local_id: &str) -> Result<Appended> {
        let now = self.clock.now();
        let appended = self.mutate(|store| {
            let mut record = store
                .get(local_id)?
                .ok_or_else(|| hse_core::Error::RecordNotFound(local_id.to_string()))?;
            record.deleted = true;
            record.updated_at = now;
            store.put(&record)?;
            let appended = OperationQueue::new(store).append(
                OpKind::Delete,
                record.entity_type,
                local_id,
                Value::Null,
                now,
            )?;
            store.refresh_state(local_id)?;
            Ok(appended)
        })?;
        debug!(local_id, "record deleted");
        Ok(appended)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub fn record(&self, local_id: &str) -> Result<Option<Record>> {
        Ok(self.lock().get(local_id)?)
    }

    pub fn records(&self, entity_type: Option<EntityType>) -> Result<Vec<Record>> {
        Ok(self.lock().list_records(entity_type)?)
    }

    /// Operations still waiting for the remote, in delivery order.
    pub fn pending_operations(&self) -> Result<Vec<Operation>> {
        Ok(self.lock().list_pending()?)
    }

    /// Operations that need a manual retry.
    pub fn failed_operations(&self) -> Result<Vec<Operation>> {
        Ok(self.lock().list_failed()?)
    }

    /// Local changes discarded by conflict resolution, payloads intact.
    pub fn superseded(&self) -> Result<Vec<Operation>> {
        Ok(self.lock().list_superseded()?)
    }

    /// Every operation for one record, oldest first.
    pub fn operations_for(&self, local_id: &str) -> Result<Vec<Operation>> {
        Ok(self.lock().operations_for(local_id)?)
    }

    pub fn is_online(&self) -> bool {
        self.engine.state().is_online()
    }

    pub fn pending_count(&self) -> usize {
        self.engine.state().pending_count()
    }

    pub fn failed_count(&self) -> usize {
        self.engine.state().failed_count()
    }

    pub fn status(&self) -> SyncStatus {
        self.engine.state().snapshot()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────

    /// Feed a platform connectivity signal.
    pub fn set_online(&self, online: bool) {
        self.engine.state().connectivity().set_online(online);
    }

    /// Probe the remote now and update connectivity.
    pub async fn check_connectivity(&self) -> bool {
        probe_once(
            self.remote.as_ref(),
            self.engine.state().connectivity(),
            self.config.remote.request_timeout(),
        )
        .await
    }

    /// Drain the queue now.
    ///
    /// Fails with [`Error::SyncLocked`] if another context syncs this store.
    pub async fn sync_now(&self) -> Result<SyncSummary> {
        self.ensure_can_sync()?;
        self.engine.sync_all().await
    }

    /// Re-queue every failed operation. Returns how many were re-queued.
    pub fn retry_failed(&self) -> Result<usize> {
        let now = self.clock.now();
        let requeued = self.mutate(|store| {
            let requeued = OperationQueue::new(store).retry_failed(now)?;
            for op in &requeued {
                store.refresh_state(&op.local_id)?;
            }
            Ok(requeued.len())
        })?;
        if requeued > 0 {
            info!(requeued, "failed operations re-queued");
        }
        Ok(requeued)
    }

    /// Sync every `interval`, on reconnect, and probe connectivity at the same pace.
    ///
    /// Fails with [`Error::SyncLocked`] if another context syncs this store.
    pub fn start_auto_sync(&self, interval: Duration) -> Result<()> {
        self.ensure_can_sync()?;
        self.probe.start(interval);
        self.auto_sync.start(interval);
        Ok(())
    }

    /// Stop scheduling. A run already in progress finishes on its own.
    pub fn stop_auto_sync(&self) {
        self.auto_sync.stop();
        self.probe.stop();
    }

    /// Stop background tasks, wait for an in-progress run, and release the store.
    pub async fn shutdown(self) {
        self.auto_sync.stop_and_wait().await;
        self.probe.stop_and_wait().await;
        debug!("sync context shut down");
    }
}

/// Take the sync lock of a state directory, or `None` if another process holds it.
fn try_lock_sync(state_dir: &Path) -> Result<Option<File>> {
    use fs2::FileExt;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(sync_lock_path(state_dir))?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(_) => Ok(None),
    }
}

fn ensure_object(payload: &Value) -> Result<()> {
    let kind = match payload {
        Value::Object(_) => return Ok(()),
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    Err(Error::PayloadNotObject(kind.to_string()))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
