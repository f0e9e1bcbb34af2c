//! Exclusive, time-bounded leases on jobs.

use std::sync::Arc;
use std::time::Duration;

use queuectl_core::backoff::BackoffPolicy;
use queuectl_core::result::AppResult;
use queuectl_database::repositories::JobRepository;
use queuectl_entity::job::{FailureOutcome, Job, Lease};

/// Result of trying to lease a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquire {
    /// The caller now holds the lease.
    Granted(Lease),
    /// Another worker holds a valid lease, or the job is not due.
    Busy,
}

/// Grants and releases leases on top of the job store's atomic claim.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    jobs: Arc<JobRepository>,
    backoff: BackoffPolicy,
}

impl LeaseManager {
    /// Create a lease manager applying `backoff` to failed jobs.
    pub fn new(jobs: Arc<JobRepository>, backoff: BackoffPolicy) -> Self {
        Self { jobs, backoff }
    }

    /// Try to lease a job for `lease_duration`.
    pub async fn acquire(&self, job_id: &str, lease_duration: Duration) -> AppResult<Acquire> {
        match self.jobs.try_claim(job_id, lease_duration).await? {
            Some(lease) => {
                tracing::debug!(
                    job_id = %lease.job.id,
                    locked_until = %lease.locked_until,
                    "Lease granted"
                );
                Ok(Acquire::Granted(lease))
            }
            None => Ok(Acquire::Busy),
        }
    }

    /// Release a lease after a successful run, marking the job done.
    ///
    /// Fails with `LeaseExpired` if the lease lapsed or was reclaimed.
    pub async fn release_success(&self, lease: &Lease) -> AppResult<Job> {
        self.jobs.complete(lease.job_id(), lease.token).await
    }

    /// Release a lease after a failed run, rescheduling or burying the job.
    ///
    /// Fails with `LeaseExpired` if the lease lapsed or was reclaimed.
    pub async fn release_failure(&self, lease: &Lease, error: &str) -> AppResult<FailureOutcome> {
        self.jobs
            .fail(lease.job_id(), lease.token, error, &self.backoff)
            .await
    }

    /// Hand a lease back without running the job, leaving it pending and
    /// immediately claimable.
    pub async fn release_unused(&self, lease: &Lease) -> AppResult<Job> {
        let job = self.jobs.release(lease.job_id(), lease.token).await?;
        tracing::debug!(job_id = %job.id, "Lease returned unused");
        Ok(job)
    }
}
