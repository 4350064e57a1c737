// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{Duration, TimeZone};
use serde_json::json;
use yare::parameterized;

fn sample_op(status: OpStatus, attempts: u32) -> Operation {
    Operation {
        id: 7,
        position: 7,
        entity_type: EntityType::Incident,
        local_id: "inc-00000001".to_string(),
        remote_id: None,
        kind: OpKind::Update,
        payload: json!({"title": "Spill in bay 3"}),
        created_at: Utc.timestamp_millis_opt(1_000).unwrap(),
        status,
        attempts,
        last_error: None,
        next_attempt_at: None,
        superseded: false,
        requeued_as: None,
    }
}

#[parameterized(
    pending_to_in_flight = { OpStatus::Pending, OpStatus::InFlight, true },
    in_flight_to_done = { OpStatus::InFlight, OpStatus::Done, true },
    in_flight_to_failed = { OpStatus::InFlight, OpStatus::Failed, true },
    in_flight_to_pending = { OpStatus::InFlight, OpStatus::Pending, true },
    pending_to_done = { OpStatus::Pending, OpStatus::Done, false },
    done_to_pending = { OpStatus::Done, OpStatus::Pending, false },
    done_to_in_flight = { OpStatus::Done, OpStatus::InFlight, false },
    failed_to_pending = { OpStatus::Failed, OpStatus::Pending, false },
    failed_to_done = { OpStatus::Failed, OpStatus::Done, false },
    pending_to_pending = { OpStatus::Pending, OpStatus::Pending, false },
)]
fn status_transitions(from: OpStatus, to: OpStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[parameterized(
    create = { "create", OpKind::Create },
    update = { "UPDATE", OpKind::Update },
    delete = { "delete", OpKind::Delete },
)]
fn parse_op_kind(input: &str, expected: OpKind) {
    assert_eq!(input.parse::<OpKind>().unwrap(), expected);
}

#[test]
fn parse_op_status_round_trip() {
    for status in [
        OpStatus::Pending,
        OpStatus::InFlight,
        OpStatus::Failed,
        OpStatus::Done,
    ] {
        assert_eq!(status.as_str().parse::<OpStatus>().unwrap(), status);
    }
    assert!("sent".parse::<OpStatus>().is_err());
}

#[test]
fn terminal_statuses() {
    assert!(OpStatus::Done.is_terminal());
    assert!(OpStatus::Failed.is_terminal());
    assert!(!OpStatus::Pending.is_terminal());
    assert!(!OpStatus::InFlight.is_terminal());
}

#[test]
fn unsent_only_when_pending_without_attempts() {
    assert!(sample_op(OpStatus::Pending, 0).is_unsent());
    assert!(!sample_op(OpStatus::Pending, 1).is_unsent());
    assert!(!sample_op(OpStatus::InFlight, 0).is_unsent());
}

#[test]
fn failed_counts_as_unresolved_until_requeued() {
    let mut op = sample_op(OpStatus::Failed, 11);
    assert!(op.is_unresolved());
    op.requeued_as = Some(9);
    assert!(!op.is_unresolved());
    assert!(!sample_op(OpStatus::Done, 0).is_unresolved());
}

#[test]
fn due_respects_backoff() {
    let mut op = sample_op(OpStatus::Pending, 1);
    let now = Utc.timestamp_millis_opt(10_000).unwrap();
    assert!(op.is_due(now));

    op.next_attempt_at = Some(now + Duration::seconds(2));
    assert!(!op.is_due(now));
    assert!(op.is_due(now + Duration::seconds(2)));
}
