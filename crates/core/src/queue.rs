// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Ordering and coalescing rules for the pending-operation queue.
//!
//! The queue sits on top of [`LocalStore`]: it appends operations, folds
//! redundant unsent ones together, and hands out batches that never send an
//! operation for a record before an earlier, unresolved one for the same
//! record.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use crate::entity::EntityType;
use crate::error::{Error, Result};
use crate::op::{NewOperation, OpKind, OpStatus, Operation, OperationId};
use crate::store::LocalStore;

/// Outcome of appending an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Appended {
    /// Stored as a new pending operation.
    Queued {
        op: Operation,
        /// Earlier unsent operations the new one cancelled.
        cancelled: Vec<OperationId>,
    },
    /// Folded into an earlier unsent operation, which now carries the payload.
    Merged(Operation),
    /// A delete of a record the remote never saw: all of its operations,
    /// including the delete, were dropped.
    Collapsed { removed: Vec<OperationId> },
}

impl Appended {
    /// The operation that will eventually be sent, if any.
    pub fn effective(&self) -> Option<&Operation> {
        match self {
            Appended::Queued { op, .. } | Appended::Merged(op) => Some(op),
            Appended::Collapsed { .. } => None,
        }
    }
}

/// Queue view over a local store.
pub struct OperationQueue<'s> {
    store: &'s mut LocalStore,
}

impl<'s> OperationQueue<'s> {
    pub fn new(store: &'s mut LocalStore) -> Self {
        OperationQueue { store }
    }

    /// Append a mutation intent and coalesce it with unsent predecessors.
    ///
    /// Appending anything after a queued delete of the same record fails with
    /// [`Error::RecordNotFound`].
    pub fn append(
        &mut self,
        kind: OpKind,
        entity_type: EntityType,
        local_id: &str,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<Appended> {
        self.store.atomically(|store| {
            let pending = store
                .list_pending()?
                .into_iter()
                .filter(|op| op.local_id == local_id)
                .collect::<Vec<_>>();
            if pending.iter().any(|op| op.kind == OpKind::Delete) {
                return Err(Error::RecordNotFound(local_id.to_string()));
            }
            if kind == OpKind::Create && !pending.is_empty() {
                return Err(Error::AlreadyQueued(local_id.to_string()));
            }

            let remote_id = store
                .get_including_deleted(local_id)?
                .and_then(|record| record.remote_id);
            let new_op = NewOperation::new(kind, entity_type, local_id, payload, now)
                .with_remote_id(remote_id);
            store.enqueue(&new_op)?;

            OperationQueue::new(store).coalesce(local_id)
        })
    }

    /// Collapse redundant unsent operations for a record, judged against its
    /// newest operation.
    pub fn coalesce(&mut self, local_id: &str) -> Result<Appended> {
        self.store.atomically(|store| {
            let ops = store.operations_for(local_id)?;
            let unresolved: Vec<&Operation> =
                ops.iter().filter(|op| op.is_unresolved()).collect();
            let Some((last, earlier)) = unresolved.split_last() else {
                return Err(Error::RecordNotFound(local_id.to_string()));
            };
            let last = (*last).clone();

            match last.kind {
                OpKind::Create => Ok(Appended::Queued {
                    op: last,
                    cancelled: Vec::new(),
                }),
                OpKind::Update => {
                    let target = earlier.last().filter(|prev| {
                        prev.is_unsent() && matches!(prev.kind, OpKind::Create | OpKind::Update)
                    });
                    match (target, last.is_unsent()) {
                        (Some(prev), true) => {
                            let merged = store.update_payload(prev.id, &last.payload)?;
                            store.remove_operation(last.id)?;
                            Ok(Appended::Merged(merged))
                        }
                        _ => Ok(Appended::Queued {
                            op: last,
                            cancelled: Vec::new(),
                        }),
                    }
                }
                OpKind::Delete => {
                    let remote_saw_it = last.remote_id.is_some()
                        || store
                            .get_including_deleted(local_id)?
                            .is_some_and(|record| record.remote_id.is_some())
                        || ops.iter().any(|op| {
                            op.id != last.id && !op.is_unsent() && !op.is_refused_unapplied()
                        });

                    if !remote_saw_it {
                        let removed: Vec<OperationId> = ops.iter().map(|op| op.id).collect();
                        for id in &removed {
                            store.remove_operation(*id)?;
                        }
                        store.delete(local_id)?;
                        return Ok(Appended::Collapsed { removed });
                    }

                    let cancelled: Vec<OperationId> = earlier
                        .iter()
                        .filter(|op| op.kind == OpKind::Update && op.is_unsent())
                        .map(|op| op.id)
                        .collect();
                    for id in &cancelled {
                        store.remove_operation(*id)?;
                    }
                    Ok(Appended::Queued { op: last, cancelled })
                }
            }
        })
    }

    /// The oldest due operations, at most one per record.
    ///
    /// An operation is skipped while an earlier unresolved operation for the
    /// same record exists (pending, in flight, or failed without a retry).
    pub fn next_batch(&self, max_size: usize, now: DateTime<Utc>) -> Result<Vec<Operation>> {
        let mut blocked: HashSet<String> = HashSet::new();
        let mut batch = Vec::new();

        for op in self.store.list_pending()? {
            if batch.len() >= max_size {
                break;
            }
            if !blocked.insert(op.local_id.clone()) {
                continue;
            }
            if op.status == OpStatus::Pending && op.is_due(now) {
                batch.push(op);
            }
        }

        Ok(batch)
    }

    /// Earliest time a not-yet-due pending operation becomes sendable.
    pub fn next_due_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .list_by_status(OpStatus::Pending)?
            .into_iter()
            .filter_map(|op| op.next_attempt_at)
            .min())
    }

    /// Re-enqueue every failed operation as a fresh pending one.
    ///
    /// Replacements keep the original position, so they are still delivered
    /// before later operations for the same record.
    pub fn retry_failed(&mut self, now: DateTime<Utc>) -> Result<Vec<Operation>> {
        self.store.atomically(|store| {
            let mut requeued = Vec::new();
            for failed in store.list_failed()? {
                let replacement = NewOperation {
                    entity_type: failed.entity_type,
                    local_id: failed.local_id.clone(),
                    remote_id: failed.remote_id.clone(),
                    kind: failed.kind,
                    payload: failed.payload.clone(),
                    created_at: now,
                    position: Some(failed.position),
                };
                let op = store.enqueue(&replacement)?;
                store.mark_requeued(failed.id, op.id)?;
                requeued.push(op);
            }
            Ok(requeued)
        })
    }

    /// Return operations interrupted by a crash to `Pending`.
    pub fn recover(&mut self) -> Result<usize> {
        self.store.reset_in_flight()
    }

    /// Number of operations still counting as pending work.
    pub fn pending_count(&self) -> Result<usize> {
        self.store.count_unresolved()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
