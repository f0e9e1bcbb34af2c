//! Queue-wide retry defaults.

use serde::{Deserialize, Serialize};

/// Retry and backoff defaults applied to newly submitted jobs.
///
/// `max_retries` is copied into each job at enqueue time; changing it later
/// only affects jobs submitted afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default retry budget for new jobs.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Exponential backoff base.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
    /// Upper bound on a single backoff delay, in seconds.
    #[serde(default = "default_backoff_max_seconds")]
    pub backoff_max_seconds: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
            backoff_max_seconds: default_backoff_max_seconds(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    2.0
}

fn default_backoff_max_seconds() -> f64 {
    600.0
}
