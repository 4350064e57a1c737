// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync configuration management.
//!
//! Configuration is stored in `<state_dir>/config.toml` and includes:
//! - `[remote]`: WebSocket endpoint of the system of record and its timeout
//! - `[sync]`: auto-sync interval, batch size, retry ceiling, backoff, and
//!   the conflict policy
//!
//! Every key has a default, so a missing file or a partial file is valid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::env;
use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "store.db";
const LOG_FILE_NAME: &str = "sync.log";
const SYNC_LOCK_NAME: &str = "sync.lock";
const STATE_DIR_NAME: &str = "hse-sync";

/// Sync configuration stored in `<state_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Where and how to reach the remote system of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,
    /// Upper bound on a single remote call; an elapsed call is a transient failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Queue draining and retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Auto-sync period in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum operations sent per pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Failed attempts allowed before an operation is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff delay for the first retry, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Largest backoff delay, in seconds.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Spread retries uniformly over `[0, delay]`.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

/// What to do when the remote reports a version mismatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the remote value; the local change is recorded as superseded.
    ///
    /// If newer local changes to the same record are still queued, the record
    /// keeps its local payload and only takes the remote version. Those
    /// changes are then sent on top of the remote version and overwrite it.
    #[default]
    RemoteWins,
    /// Rebase the local change on the remote version and send it again.
    LocalWins,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::RemoteWins => "remote-wins",
            ConflictPolicy::LocalWins => "local-wins",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "remote-wins" => Ok(ConflictPolicy::RemoteWins),
            "local-wins" => Ok(ConflictPolicy::LocalWins),
            _ => Err(Error::InvalidConflictPolicy(s.to_string())),
        }
    }
}

fn default_url() -> String {
    "ws://localhost:7890".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    30
}

fn default_batch_size() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_secs() -> u64 {
    300
}

fn default_jitter() -> bool {
    true
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: default_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_secs: default_backoff_cap_secs(),
            jitter: default_jitter(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Retry delay schedule described by this config.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_secs(self.backoff_cap_secs),
            self.jitter,
        )
    }
}

impl Config {
    /// Loads configuration from the given state directory.
    ///
    /// A missing file yields the defaults.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let config_path = config_path(state_dir);
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to the given state directory.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(config_path(state_dir), content)?;
        Ok(())
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let url = &self.remote.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(Error::InvalidRemoteUrl(url.clone()));
        }
        if self.sync.batch_size == 0 {
            return Err(Error::Config("sync.batch_size must be at least 1".to_string()));
        }
        if self.sync.interval_secs == 0 {
            return Err(Error::Config("sync.interval_secs must be at least 1".to_string()));
        }
        if self.remote.request_timeout_secs == 0 {
            return Err(Error::Config(
                "remote.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the state directory: flag, then `HSE_SYNC_STATE_DIR`, then
/// `$XDG_STATE_HOME/hse-sync`, then `~/.local/state/hse-sync`.
pub fn resolve_state_dir(flag: Option<&Path>) -> Result<PathBuf> {
    state_dir_from(
        flag,
        env::state_dir(),
        env::xdg_state_home(),
        dirs::home_dir(),
    )
    .ok_or(Error::NoStateDir)
}

fn state_dir_from(
    flag: Option<&Path>,
    env_dir: Option<PathBuf>,
    xdg_state_home: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or(env_dir)
        .or_else(|| xdg_state_home.map(|dir| dir.join(STATE_DIR_NAME)))
        .or_else(|| home.map(|h| h.join(".local/state").join(STATE_DIR_NAME)))
}

pub fn config_path(state_dir: &Path) -> PathBuf {
    state_dir.join(CONFIG_FILE_NAME)
}

pub fn db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(DB_FILE_NAME)
}

pub fn log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_FILE_NAME)
}

pub fn sync_lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SYNC_LOCK_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
