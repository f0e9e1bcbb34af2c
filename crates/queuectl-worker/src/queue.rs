//! Job queue facade for submitting and inspecting jobs.

use std::sync::Arc;

use queuectl_core::config::QueueConfig;
use queuectl_core::error::{AppError, ErrorKind};
use queuectl_core::result::AppResult;
use queuectl_database::repositories::{DeadLetterRepository, JobRepository};
use queuectl_entity::job::{Job, JobState, NewJob, StateCounts};

/// Attempts at finding a free generated id before giving up.
const GENERATED_ID_ATTEMPTS: usize = 5;

/// Job queue for submission and read-only inspection
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Main job table
    jobs: Arc<JobRepository>,
    /// Dead-letter table, consulted for `dead` listings
    dead_letters: Arc<DeadLetterRepository>,
    /// Configuration snapshot applied to new jobs
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue
    pub fn new(
        jobs: Arc<JobRepository>,
        dead_letters: Arc<DeadLetterRepository>,
        config: QueueConfig,
    ) -> Self {
        Self {
            jobs,
            dead_letters,
            config,
        }
    }

    /// Submit a new job.
    ///
    /// A missing retry budget is filled from the current configuration and
    /// stored with the job, so later configuration changes do not affect it.
    pub async fn submit(&self, mut job: NewJob) -> AppResult<Job> {
        job.max_retries.get_or_insert(self.config.max_retries);

        if job.id.is_some() {
            return self.create(&job).await;
        }

        for _ in 0..GENERATED_ID_ATTEMPTS {
            match self.create(&job).await {
                Err(e) if e.kind == ErrorKind::DuplicateId => {
                    tracing::debug!(error = %e, "Generated job id collided, retrying");
                }
                other => return other,
            }
        }
        Err(AppError::internal("Could not generate a unique job id"))
    }

    async fn create(&self, job: &NewJob) -> AppResult<Job> {
        let created = self.jobs.create(job).await?;
        tracing::info!(
            job_id = %created.id,
            max_retries = created.max_retries,
            "Job enqueued"
        );
        Ok(created)
    }

    /// Fetch a job from the main queue, falling back to the DLQ.
    pub async fn get(&self, id: &str) -> AppResult<Job> {
        self.jobs.find_anywhere(id).await
    }

    /// List jobs, optionally filtered by state. `dead` lists the DLQ.
    pub async fn list(&self, state: Option<JobState>, limit: Option<u32>) -> AppResult<Vec<Job>> {
        match state {
            Some(JobState::Dead) => Ok(self
                .dead_letters
                .list(limit)
                .await?
                .into_iter()
                .map(|entry| entry.job)
                .collect()),
            state => self.jobs.list(state, limit).await,
        }
    }

    /// Delete a job from the main queue, ignoring any lease.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.jobs.delete(id).await?;
        tracing::info!(job_id = %id, "Job deleted");
        Ok(())
    }

    /// Number of jobs per state, with the DLQ size as `dead`.
    pub async fn stats(&self) -> AppResult<StateCounts> {
        self.jobs.count_by_state().await
    }
}
