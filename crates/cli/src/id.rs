// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use hse_core::EntityType;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

static NONCE: AtomicU64 = AtomicU64::new(0);

/// Generate a local record ID from entity type, creation time, and nonce.
/// Format: {prefix}-{hash} where hash is first 8 hex chars of SHA256(input)
pub fn generate_id(entity_type: EntityType, created_at: &DateTime<Utc>, nonce: u64) -> String {
    let input = format!(
        "{}{}{}:{}",
        entity_type.as_str(),
        created_at.to_rfc3339(),
        std::process::id(),
        nonce
    );
    let hash = Sha256::digest(input.as_bytes());
    let short_hash = hex::encode(&hash[..4]); // First 8 hex chars (4 bytes)
    format!("{}-{}", entity_type.id_prefix(), short_hash)
}

/// Generate a unique local ID, handling collisions by appending incrementing suffix.
pub fn generate_unique_id<F, E>(
    entity_type: EntityType,
    created_at: &DateTime<Utc>,
    mut exists: F,
) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let nonce = NONCE.fetch_add(1, Ordering::Relaxed);
    let base_id = generate_id(entity_type, created_at, nonce);

    if !exists(&base_id)? {
        return Ok(base_id);
    }

    // Handle collision with incrementing suffix
    let mut suffix = 2;
    loop {
        let id = format!("{}-{}", base_id, suffix);
        if !exists(&id)? {
            return Ok(id);
        }
        suffix += 1;
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
