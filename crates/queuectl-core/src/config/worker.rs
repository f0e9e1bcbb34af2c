//! Background worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Worker loop parameters, read once when a worker starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers started by `worker start` and the daemon.
    #[serde(default = "default_count")]
    pub count: usize,
    /// Lease length granted on each claim, in seconds.
    #[serde(default = "default_lease_duration")]
    pub lease_duration_seconds: u64,
    /// Sleep between polls when no job could be claimed, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Hard limit on a single command run, in seconds. Must be shorter than
    /// the lease so a slow command cannot outlive its claim.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_seconds: u64,
    /// Time an in-flight command may keep running after shutdown is
    /// requested, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
    /// Number of claim candidates fetched per poll.
    #[serde(default = "default_claim_batch_size")]
    pub claim_batch_size: u32,
}

impl WorkerConfig {
    /// Lease length as a [`Duration`].
    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_seconds)
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Execution timeout as a [`Duration`].
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds)
    }

    /// Shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            lease_duration_seconds: default_lease_duration(),
            poll_interval_ms: default_poll_interval(),
            execution_timeout_seconds: default_execution_timeout(),
            shutdown_grace_seconds: default_shutdown_grace(),
            claim_batch_size: default_claim_batch_size(),
        }
    }
}

fn default_count() -> usize {
    1
}

fn default_lease_duration() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_execution_timeout() -> u64 {
    270
}

fn default_shutdown_grace() -> u64 {
    30
}

fn default_claim_batch_size() -> u32 {
    16
}
