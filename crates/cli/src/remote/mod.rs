// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the remote system of record.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ SyncEngine  │────►│ RemoteStore  │────►│  hse-remote │
//! │             │◄────│   (trait)    │◄────│   server    │
//! └─────────────┘     └──────────────┘     └─────────────┘
//! ```

mod transport;

pub use transport::{
    RemoteAck, RemoteError, RemoteRequest, RemoteResult, RemoteStore, WebSocketRemote,
};

#[cfg(test)]
pub(crate) mod test_helpers;
