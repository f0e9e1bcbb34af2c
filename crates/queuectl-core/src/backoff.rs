//! Retry backoff policy.
//!
//! Pure functions deciding whether a failed job gets another attempt and how
//! long it waits before becoming eligible again.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::queue::QueueConfig;

/// Absolute ceiling applied on top of any configured cap (one year).
const BACKOFF_CEILING_SECONDS: f64 = 365.0 * 24.0 * 3600.0;

/// Delay before the next attempt: `min(base^retries, max_seconds)` seconds.
///
/// A `base <= 1` degenerates to a constant delay of `base` seconds (floored at
/// zero). Non-finite results collapse to the cap; the cap is clamped to
/// `[0, one year]` and a NaN cap counts as zero.
pub fn next_backoff(retries: u32, base: f64, max_seconds: f64) -> Duration {
    let cap = if max_seconds.is_nan() {
        0.0
    } else {
        max_seconds.clamp(0.0, BACKOFF_CEILING_SECONDS)
    };

    let raw = if base.is_nan() {
        cap
    } else if base <= 1.0 {
        base.max(0.0)
    } else {
        let exponent = i32::try_from(retries).unwrap_or(i32::MAX);
        base.powi(exponent)
    };

    let seconds = if raw.is_finite() { raw.min(cap) } else { cap };
    Duration::from_secs_f64(seconds)
}

/// Whether a job that has already failed `retries` times may run again.
pub fn should_retry(retries: u32, max_retries: u32) -> bool {
    retries < max_retries
}

/// Backoff parameters captured from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Exponential base.
    pub base: f64,
    /// Upper bound on any single delay, in seconds.
    pub max_seconds: f64,
}

impl BackoffPolicy {
    /// Create a policy from explicit parameters.
    pub fn new(base: f64, max_seconds: f64) -> Self {
        Self { base, max_seconds }
    }

    /// Delay to apply after the given number of previous failures.
    pub fn delay_for(&self, retries: u32) -> Duration {
        next_backoff(retries, self.base, self.max_seconds)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for BackoffPolicy {
    fn from(config: &QueueConfig) -> Self {
        Self::new(config.backoff_base, config.backoff_max_seconds)
    }
}
