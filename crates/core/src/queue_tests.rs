// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use crate::record::Record;
use chrono::{Duration, TimeZone};
use serde_json::json;

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

fn store_with_record(local_id: &str) -> LocalStore {
    let mut store = LocalStore::open_in_memory().unwrap();
    store
        .put(&Record::new(
            local_id,
            EntityType::Hazop,
            json!({"node": "P-101"}),
            at(0),
        ))
        .unwrap();
    store
}

fn append(store: &mut LocalStore, kind: OpKind, local_id: &str, payload: Value) -> Appended {
    OperationQueue::new(store)
        .append(kind, EntityType::Hazop, local_id, payload, at(1_000))
        .unwrap()
}

/// Simulate the engine sending an operation and getting an acknowledgement.
fn deliver(store: &mut LocalStore, id: OperationId) {
    store.begin_attempt(id).unwrap();
    store.complete(id, false).unwrap();
}

#[test]
fn create_then_update_keeps_one_operation_with_latest_payload() {
    let mut store = store_with_record("hzp-1");
    let created = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let merged = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));

    let create_id = created.effective().unwrap().id;
    assert!(matches!(merged, Appended::Merged(ref op) if op.id == create_id));

    let pending = store.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, OpKind::Create);
    assert_eq!(pending[0].payload, json!({"v": 2}));
}

#[test]
fn update_then_update_keeps_latest_payload_under_first_id() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    deliver(&mut store, create.effective().unwrap().id);

    let first = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));
    let second = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 3}));

    let first_id = first.effective().unwrap().id;
    assert!(matches!(second, Appended::Merged(ref op) if op.id == first_id));

    let pending = store.list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, first_id);
    assert_eq!(pending[0].payload, json!({"v": 3}));
}

#[test]
fn update_after_sent_update_is_not_merged() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    deliver(&mut store, create.effective().unwrap().id);

    let first = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));
    let first_id = first.effective().unwrap().id;
    // First update went out and timed out: it may have reached the remote
    store.begin_attempt(first_id).unwrap();
    store.retry_later(first_id, at(2_000), "timeout").unwrap();

    let second = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 3}));
    assert!(matches!(second, Appended::Queued { .. }));
    assert_eq!(store.list_pending().unwrap().len(), 2);
}

#[test]
fn create_then_delete_collapses_to_nothing() {
    let mut store = store_with_record("hzp-1");
    append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));
    let deleted = append(&mut store, OpKind::Delete, "hzp-1", Value::Null);

    assert!(matches!(deleted, Appended::Collapsed { ref removed } if removed.len() == 2));
    assert!(store.list_pending().unwrap().is_empty());
    assert!(!store.record_exists("hzp-1").unwrap());
}

#[test]
fn delete_after_sent_create_keeps_create_first() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let create_id = create.effective().unwrap().id;
    store.begin_attempt(create_id).unwrap();
    store.retry_later(create_id, at(1_500), "timeout").unwrap();

    let deleted = append(&mut store, OpKind::Delete, "hzp-1", Value::Null);
    assert!(matches!(deleted, Appended::Queued { ref cancelled, .. } if cancelled.is_empty()));

    let kinds: Vec<OpKind> = store.list_pending().unwrap().iter().map(|op| op.kind).collect();
    assert_eq!(kinds, vec![OpKind::Create, OpKind::Delete]);
}

#[test]
fn delete_after_refused_create_collapses_to_nothing() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let create_id = create.effective().unwrap().id;
    store.begin_attempt(create_id).unwrap();
    store.fail(create_id, "rejected: missing node").unwrap();
    append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));

    let deleted = append(&mut store, OpKind::Delete, "hzp-1", Value::Null);

    assert!(matches!(deleted, Appended::Collapsed { ref removed } if removed.len() == 3));
    let queue = OperationQueue::new(&mut store);
    assert_eq!(queue.pending_count().unwrap(), 0);
    assert!(store.list_failed().unwrap().is_empty());
    assert!(store.get_including_deleted("hzp-1").unwrap().is_none());
}

#[test]
fn delete_after_exhausted_create_stays_queued() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let create_id = create.effective().unwrap().id;
    store.begin_attempt(create_id).unwrap();
    store.retry_later(create_id, at(1_500), "timeout").unwrap();
    store.begin_attempt(create_id).unwrap();
    store
        .fail(create_id, "rejected: duplicate incident number")
        .unwrap();

    // The timed-out attempt may have reached the remote
    let deleted = append(&mut store, OpKind::Delete, "hzp-1", Value::Null);

    assert!(matches!(deleted, Appended::Queued { ref op, .. } if op.kind == OpKind::Delete));
    assert_eq!(OperationQueue::new(&mut store).pending_count().unwrap(), 2);
}

#[test]
fn delete_cancels_unsent_updates_of_confirmed_record() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    deliver(&mut store, create.effective().unwrap().id);
    store.set_remote_id("hzp-1", "rem-1").unwrap();

    let update = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));
    let update_id = update.effective().unwrap().id;
    let deleted = append(&mut store, OpKind::Delete, "hzp-1", Value::Null);

    match deleted {
        Appended::Queued { op, cancelled } => {
            assert_eq!(op.kind, OpKind::Delete);
            assert_eq!(op.remote_id.as_deref(), Some("rem-1"));
            assert_eq!(cancelled, vec![update_id]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store.list_pending().unwrap().len(), 1);
}

#[test]
fn append_after_delete_is_refused() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    deliver(&mut store, create.effective().unwrap().id);
    append(&mut store, OpKind::Delete, "hzp-1", Value::Null);

    let err = OperationQueue::new(&mut store)
        .append(OpKind::Update, EntityType::Hazop, "hzp-1", json!({}), at(2_000))
        .unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(_)));
}

#[test]
fn second_create_is_refused() {
    let mut store = store_with_record("hzp-1");
    append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let err = OperationQueue::new(&mut store)
        .append(OpKind::Create, EntityType::Hazop, "hzp-1", json!({}), at(2_000))
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyQueued(_)));
}

#[test]
fn next_batch_returns_one_operation_per_record_in_order() {
    let mut store = LocalStore::open_in_memory().unwrap();
    let mut queue = OperationQueue::new(&mut store);
    let a = queue
        .append(OpKind::Create, EntityType::Jsa, "jsa-a", json!({}), at(1))
        .unwrap();
    let b = queue
        .append(OpKind::Create, EntityType::Jsa, "jsa-b", json!({}), at(2))
        .unwrap();

    let batch = queue.next_batch(10, at(10)).unwrap();
    let ids: Vec<OperationId> = batch.iter().map(|op| op.id).collect();
    assert_eq!(
        ids,
        vec![a.effective().unwrap().id, b.effective().unwrap().id]
    );
}

#[test]
fn next_batch_holds_back_later_operation_for_same_record() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let create_id = create.effective().unwrap().id;
    // Create is in flight; the update must wait for it
    store.begin_attempt(create_id).unwrap();
    store.retry_later(create_id, at(1_000), "timeout").unwrap();
    append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));

    let queue = OperationQueue::new(&mut store);
    let batch = queue.next_batch(10, at(5_000)).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, create_id);
}

#[test]
fn next_batch_skips_operations_in_backoff() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let create_id = create.effective().unwrap().id;
    store.begin_attempt(create_id).unwrap();
    let due = at(1_000) + Duration::seconds(4);
    store.retry_later(create_id, due, "timeout").unwrap();

    let queue = OperationQueue::new(&mut store);
    assert!(queue.next_batch(10, at(1_000)).unwrap().is_empty());
    assert_eq!(queue.next_due_at().unwrap(), Some(due));
    assert_eq!(queue.next_batch(10, due).unwrap().len(), 1);
}

#[test]
fn next_batch_respects_max_size() {
    let mut store = LocalStore::open_in_memory().unwrap();
    let mut queue = OperationQueue::new(&mut store);
    for i in 0..5 {
        queue
            .append(
                OpKind::Create,
                EntityType::Permit,
                &format!("prm-{i}"),
                json!({}),
                at(i),
            )
            .unwrap();
    }
    assert_eq!(queue.next_batch(3, at(100)).unwrap().len(), 3);
}

#[test]
fn failed_operation_blocks_later_ones_until_retried() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    let create_id = create.effective().unwrap().id;
    store.begin_attempt(create_id).unwrap();
    store.fail(create_id, "rejected: missing node").unwrap();
    let update = append(&mut store, OpKind::Update, "hzp-1", json!({"v": 2}));

    let mut queue = OperationQueue::new(&mut store);
    assert!(queue.next_batch(10, at(5_000)).unwrap().is_empty());
    assert_eq!(queue.pending_count().unwrap(), 2);

    let requeued = queue.retry_failed(at(6_000)).unwrap();
    assert_eq!(requeued.len(), 1);
    assert_eq!(requeued[0].position, create.effective().unwrap().position);
    assert_eq!(requeued[0].attempts, 0);
    assert_eq!(queue.pending_count().unwrap(), 2);

    // The replacement goes first, ahead of the newer update
    let batch = queue.next_batch(10, at(6_000)).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].kind, OpKind::Create);
    assert!(batch[0].position < update.effective().unwrap().position);
}

#[test]
fn recover_resets_in_flight() {
    let mut store = store_with_record("hzp-1");
    let create = append(&mut store, OpKind::Create, "hzp-1", json!({"v": 1}));
    store.begin_attempt(create.effective().unwrap().id).unwrap();

    let mut queue = OperationQueue::new(&mut store);
    assert_eq!(queue.recover().unwrap(), 1);
    assert_eq!(queue.next_batch(10, at(1_000)).unwrap().len(), 1);
}
