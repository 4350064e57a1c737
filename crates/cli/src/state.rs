// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync state visible to the UI and the background tasks.
//!
//! Uses atomic fields for lock-free reads while a sync run is in progress.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use hse_core::clock;

use crate::monitor::Connectivity;

/// Shared sync state: connectivity, queue counters, and the single-flight flag.
pub struct SyncState {
    connectivity: Connectivity,
    /// Set while a sync run executes.
    in_progress: AtomicBool,
    pending: AtomicUsize,
    failed: AtomicUsize,
    /// Milliseconds since epoch of the last completed run; 0 = never.
    last_sync_ms: AtomicU64,
}

/// Point-in-time copy of [`SyncState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub pending_count: usize,
    pub failed_count: usize,
    pub in_progress: bool,
}

/// Clears the in-progress flag when dropped.
#[must_use = "the run is considered finished as soon as the guard is dropped"]
pub struct RunGuard<'a> {
    state: &'a SyncState,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.state.in_progress.store(false, Ordering::Release);
    }
}

impl SyncState {
    pub fn new(connectivity: Connectivity) -> Self {
        SyncState {
            connectivity,
            in_progress: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            last_sync_ms: AtomicU64::new(0),
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Claim the single run slot.
    ///
    /// Returns `None` if a run is already in progress. The flag is set with
    /// one compare-and-swap, before the caller reaches any await point.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { state: self })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn set_counts(&self, pending: usize, failed: usize) {
        self.pending.store(pending, Ordering::Release);
        self.failed.store(failed, Ordering::Release);
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        match self.last_sync_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(clock::from_millis(ms)),
        }
    }

    pub fn mark_synced(&self, at: DateTime<Utc>) {
        let ms = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        self.last_sync_ms.store(ms, Ordering::Release);
    }

    pub fn snapshot(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.is_online(),
            last_sync_at: self.last_sync_at(),
            pending_count: self.pending_count(),
            failed_count: self.failed_count(),
            in_progress: self.in_progress(),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
