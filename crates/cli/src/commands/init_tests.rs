// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::config::config_path;
use tempfile::TempDir;

#[test]
fn creates_config_and_store() {
    let temp = TempDir::new().unwrap();
    let state_dir = temp.path().join("state");

    let config = init_state_dir(&state_dir, None, None).unwrap();

    assert_eq!(config, Config::default());
    assert!(config_path(&state_dir).exists());
    assert!(db_path(&state_dir).exists());
    assert_eq!(Config::load(&state_dir).unwrap(), config);
}

#[test]
fn applies_remote_and_policy() {
    let temp = TempDir::new().unwrap();

    let config = init_state_dir(
        temp.path(),
        Some("wss://hse.example.com/sync".to_string()),
        Some(ConflictPolicy::LocalWins),
    )
    .unwrap();

    let saved = Config::load(temp.path()).unwrap();
    assert_eq!(saved.remote.url, "wss://hse.example.com/sync");
    assert_eq!(saved.sync.conflict_policy, ConflictPolicy::LocalWins);
    assert_eq!(saved, config);
}

#[test]
fn refuses_second_init() {
    let temp = TempDir::new().unwrap();
    init_state_dir(temp.path(), None, None).unwrap();

    let err = init_state_dir(temp.path(), None, None).unwrap_err();
    assert!(matches!(err, Error::AlreadyInitialized(_)));
}

#[test]
fn invalid_url_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let state_dir = temp.path().join("state");

    let err = init_state_dir(&state_dir, Some("http://hse.example.com".to_string()), None)
        .unwrap_err();

    assert!(matches!(err, Error::InvalidRemoteUrl(_)));
    assert!(!state_dir.exists());
}

#[test]
fn keeps_existing_config_settings() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        config_path(temp.path()),
        "[sync]\nbatch_size = 5\n",
    )
    .unwrap();

    let config = init_state_dir(temp.path(), None, None).unwrap();

    assert_eq!(config.sync.batch_size, 5);
}
