// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Nothing listens here, so every command sees the remote as offline.
pub const UNREACHABLE_REMOTE: &str = "ws://127.0.0.1:9";

/// `hse-sync` bound to a state directory, with environment overrides cleared.
pub fn hse(temp: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("hse-sync");
    cmd.env_remove("HSE_SYNC_STATE_DIR")
        .env_remove("RUST_LOG")
        .arg("--state-dir")
        .arg(temp.path());
    cmd
}

/// Helper to create an initialized state directory pointing at an offline remote
pub fn init_temp() -> TempDir {
    let temp = TempDir::new().unwrap();
    hse(&temp)
        .arg("init")
        .arg("--remote")
        .arg(UNREACHABLE_REMOTE)
        .assert()
        .success();
    temp
}

/// Helper to create a record and return its local ID
pub fn create_record(temp: &TempDir, entity: &str, data: &str) -> String {
    let output = hse(temp)
        .args(["create", entity, "--data", data, "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "create failed: {:?}", output);

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    record["local_id"].as_str().unwrap().to_string()
}

/// Parse the single-line JSON output of a command.
pub fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}
