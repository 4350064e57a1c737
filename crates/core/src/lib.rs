// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! hse-core: offline storage and operation queue for the HSE client.
//!
//! This crate provides the data model, the SQLite-backed local store, the
//! pending-operation queue, and the wire protocol shared by the `hse-sync`
//! client and the `hse-remote` reference server.

pub mod clock;
pub mod entity;
pub mod error;
pub mod op;
pub mod protocol;
pub mod queue;
pub mod record;
pub mod store;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use entity::EntityType;
pub use error::{Error, Result};
pub use op::{OpKind, OpStatus, Operation, OperationId, REJECTED_PREFIX};
pub use queue::{Appended, OperationQueue};
pub use record::{Record, RecordState};
pub use store::LocalStore;
