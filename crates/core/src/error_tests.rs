// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    record_not_found = { Error::RecordNotFound("inc-1a2b3c4d".into()), "inc-1a2b3c4d" },
    operation_not_found = { Error::OperationNotFound(42), "42" },
    storage_unavailable = { Error::StorageUnavailable("read-only".into()), "in memory" },
    entity_type = { Error::InvalidEntityType("audit".into()), "hazop" },
    op_kind = { Error::InvalidOpKind("upsert".into()), "create, update, delete" },
)]
fn error_display_contains(err: Error, expected: &str) {
    assert!(err.to_string().contains(expected));
}

#[test]
fn error_invalid_transition_display() {
    let err = Error::InvalidTransition {
        from: "done".into(),
        to: "pending".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("done"));
    assert!(msg.contains("pending"));
}

#[test]
fn error_schema_too_new_display() {
    let err = Error::SchemaTooNew {
        found: 9,
        supported: 1,
    };
    assert!(err.to_string().contains("upgrade"));
}

#[test]
fn error_from_io() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: Error = io_err.into();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<()>("invalid").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}
