//! Dead-letter queue manager.

use std::sync::Arc;

use queuectl_core::result::AppResult;
use queuectl_database::repositories::DeadLetterRepository;
use queuectl_entity::dead_letter::DeadLetter;
use queuectl_entity::job::Job;

/// Inspection and triage of jobs that exhausted their retries.
#[derive(Debug, Clone)]
pub struct DlqManager {
    repo: Arc<DeadLetterRepository>,
}

impl DlqManager {
    /// Create a DLQ manager.
    pub fn new(repo: Arc<DeadLetterRepository>) -> Self {
        Self { repo }
    }

    /// Move a job from the main queue into the DLQ in one transaction.
    pub async fn move_to_dlq(&self, job_id: &str, reason: &str) -> AppResult<DeadLetter> {
        let entry = self.repo.move_job(job_id, reason).await?;
        tracing::warn!(job_id = %entry.job.id, reason = %entry.reason, "Job moved to dead-letter queue");
        Ok(entry)
    }

    /// List entries, most recently dead first.
    pub async fn list(&self, limit: Option<u32>) -> AppResult<Vec<DeadLetter>> {
        self.repo.list(limit).await
    }

    /// Fetch one entry.
    pub async fn get(&self, job_id: &str) -> AppResult<DeadLetter> {
        self.repo.find_by_id(job_id).await
    }

    /// Re-enqueue an entry as a fresh pending job with its retry count reset.
    pub async fn retry(&self, job_id: &str) -> AppResult<Job> {
        let job = self.repo.requeue(job_id).await?;
        tracing::info!(job_id = %job.id, max_retries = job.max_retries, "Job re-enqueued from dead-letter queue");
        Ok(job)
    }

    /// Permanently delete an entry.
    pub async fn remove(&self, job_id: &str) -> AppResult<()> {
        self.repo.delete(job_id).await?;
        tracing::info!(job_id = %job_id, "Dead-letter entry removed");
        Ok(())
    }
}
