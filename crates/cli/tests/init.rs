// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

mod common;
use common::*;
use yare::parameterized;

#[test]
fn creates_state_dir() {
    let temp = TempDir::new().unwrap();

    hse(&temp)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized hse-sync"))
        .stdout(predicate::str::contains("Conflict policy: remote-wins"));

    assert!(temp.path().join("config.toml").exists());
    assert!(temp.path().join("store.db").exists());
}

#[test]
fn fails_if_already_initialized() {
    let temp = init_temp();

    hse(&temp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn writes_remote_and_policy() {
    let temp = TempDir::new().unwrap();

    hse(&temp)
        .args(["init", "--remote", "wss://hse.example.com/sync"])
        .args(["--conflict-policy", "local-wins"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote: wss://hse.example.com/sync"));

    let config = std::fs::read_to_string(temp.path().join("config.toml")).unwrap();
    assert!(config.contains("wss://hse.example.com/sync"));
    assert!(config.contains("local-wins"));
}

#[test]
fn rejects_http_remote() {
    let temp = TempDir::new().unwrap();

    hse(&temp)
        .args(["init", "--remote", "http://hse.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: invalid remote URL"));

    assert!(!temp.path().join("store.db").exists());
}

#[parameterized(
    status = { &["status"] },
    list = { &["list"] },
    queue = { &["queue"] },
    sync = { &["sync"] },
    retry = { &["retry"] },
    create = { &["create", "incident", "-d", "{}"] },
)]
fn commands_require_init(args: &[&str]) {
    let temp = TempDir::new().unwrap();

    hse(&temp)
        .args(args)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error: not initialized"))
        .stderr(predicate::str::contains("hse-sync init"));
}
