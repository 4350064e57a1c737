// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential retry delays with optional full jitter.

use std::time::Duration;

/// Retry delay schedule: `min(cap, base * 2^(attempt - 1))`, optionally
/// spread uniformly over `[0, ceiling]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    jitter: bool,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, jitter: bool) -> Self {
        Backoff { base, cap, jitter }
    }

    /// Largest delay for the given 1-based attempt number.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let base_ms = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let cap_ms = u64::try_from(self.cap.as_millis()).unwrap_or(u64::MAX);
        let ms = base_ms.saturating_mul(1u64 << exponent).min(cap_ms);
        Duration::from_millis(ms)
    }

    /// Delay before retrying after the given attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.jitter {
            self.delay_with(attempt, rand::random::<f64>())
        } else {
            self.ceiling(attempt)
        }
    }

    /// Jittered delay for a sample in `[0, 1)`.
    fn delay_with(&self, attempt: u32, sample: f64) -> Duration {
        self.ceiling(attempt).mul_f64(sample.clamp(0.0, 1.0))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(Duration::from_secs(1), Duration::from_secs(300), true)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
