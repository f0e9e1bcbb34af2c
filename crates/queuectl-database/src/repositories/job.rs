//! Job repository implementation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use queuectl_core::backoff::BackoffPolicy;
use queuectl_core::config::QueueConfig;
use queuectl_core::error::AppError;
use queuectl_core::result::AppResult;
use queuectl_entity::dead_letter::{DeadLetter, dead_reason};
use queuectl_entity::job::{FailureOutcome, Job, JobState, Lease, NewJob, StateCounts, generate_job_id};
use queuectl_entity::timestamp::to_millis;

use super::{begin, bound_error, bury, commit};

/// Claim predicate shared by candidate listing and the atomic claim.
const CLAIMABLE: &str = "((state = 'pending' AND next_run_at <= ?) \
     OR (locked_until IS NOT NULL AND locked_until < ?))";

/// Repository for job CRUD and the lease-guarded state transitions.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: SqlitePool,
    /// Retry budget given to jobs submitted without one
    default_max_retries: u32,
}

impl JobRepository {
    /// Create a job repository applying the retry budget from `queue`.
    pub fn new(pool: SqlitePool, queue: &QueueConfig) -> Self {
        Self {
            pool,
            default_max_retries: queue.max_retries,
        }
    }

    /// Insert a new pending job.
    ///
    /// The id must be free in both the jobs table and the DLQ. A missing id is
    /// generated; a missing retry budget comes from the queue configuration
    /// the repository was built with.
    pub async fn create(&self, data: &NewJob) -> AppResult<Job> {
        let command = data.command.trim();
        if command.is_empty() {
            return Err(AppError::validation("Job command must not be empty"));
        }
        let id = match &data.id {
            Some(id) if id.trim().is_empty() => {
                return Err(AppError::validation("Job id must not be empty"));
            }
            Some(id) => id.trim().to_string(),
            None => generate_job_id(),
        };
        let max_retries = data.max_retries.unwrap_or(self.default_max_retries);
        let now = to_millis(Utc::now());

        let mut tx = begin(&self.pool).await?;

        let job = sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, command, state, retries, max_retries, next_run_at, created_at, updated_at) \
             VALUES (?, ?, 'pending', 0, ?, ?, ?, ?) RETURNING *",
        )
        .bind(&id)
        .bind(command)
        .bind(max_retries)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to create job '{id}'"), e))?;

        let in_dlq: Option<i64> = sqlx::query_scalar("SELECT 1 FROM dead_letters WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to check DLQ for id", e))?;
        if in_dlq.is_some() {
            tx.rollback()
                .await
                .map_err(|e| AppError::from_sqlx("Failed to roll back job insert", e))?;
            return Err(AppError::duplicate_id(format!(
                "Job '{id}' already exists in the dead-letter queue"
            )));
        }

        commit(tx).await?;
        debug!(job_id = %job.id, max_retries, "Job created");
        Ok(job)
    }

    /// Find a job by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Job> {
        self.find_optional(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job '{id}' not found")))
    }

    /// Find a job in the main queue or, failing that, in the DLQ.
    ///
    /// Both lookups share one read snapshot, so a job buried concurrently is
    /// seen in exactly one of the tables.
    pub async fn find_anywhere(&self, id: &str) -> AppResult<Job> {
        let mut tx = begin(&self.pool).await?;

        let queued = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find job", e))?;
        let found = match queued {
            Some(job) => Some(job),
            None => sqlx::query_as::<_, DeadLetter>("SELECT * FROM dead_letters WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to find DLQ entry", e))?
                .map(|entry| entry.job),
        };

        commit(tx).await?;
        found.ok_or_else(|| AppError::not_found(format!("Job '{id}' not found")))
    }

    async fn find_optional(&self, id: &str) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find job", e))
    }

    /// List jobs, oldest first, optionally filtered by state.
    pub async fn list(&self, state: Option<JobState>, limit: Option<u32>) -> AppResult<Vec<Job>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, i64::from);
        let jobs = match state {
            Some(state) => {
                sqlx::query_as::<_, Job>(
                    "SELECT * FROM jobs WHERE state = ? ORDER BY created_at ASC, id ASC LIMIT ?",
                )
                .bind(state)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_at ASC, id ASC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        jobs.map_err(|e| AppError::from_sqlx("Failed to list jobs", e))
    }

    /// Jobs a worker could claim right now, oldest eligible first.
    pub async fn claimable(&self, limit: u32) -> AppResult<Vec<Job>> {
        let now = to_millis(Utc::now());
        sqlx::query_as::<_, Job>(&format!(
            "SELECT * FROM jobs WHERE {CLAIMABLE} ORDER BY next_run_at ASC, created_at ASC LIMIT ?"
        ))
        .bind(now)
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to list claimable jobs", e))
    }

    /// Delete a job regardless of its state or lease.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to delete job", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Job '{id}' not found")));
        }
        Ok(())
    }

    /// Atomically claim a job if it is due or its previous lease has lapsed.
    ///
    /// Returns `None` when another worker holds a valid lease, the job is not
    /// yet due, or it no longer exists.
    pub async fn try_claim(&self, id: &str, lease_duration: Duration) -> AppResult<Option<Lease>> {
        let now = Utc::now();
        let locked_until = offset(now, lease_duration)?;
        let token = Uuid::new_v4();
        let now_ms = to_millis(now);

        let claimed = sqlx::query_as::<_, Job>(&format!(
            "UPDATE jobs SET state = 'processing', locked_until = ?, lease_token = ?, updated_at = ? \
             WHERE id = ? AND {CLAIMABLE} RETURNING *"
        ))
        .bind(to_millis(locked_until))
        .bind(token.to_string())
        .bind(now_ms)
        .bind(id)
        .bind(now_ms)
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to claim job '{id}'"), e))?;

        Ok(claimed.map(|job| Lease {
            locked_until: job.locked_until.unwrap_or(locked_until),
            job,
            token,
        }))
    }

    /// Mark a leased job as done.
    pub async fn complete(&self, id: &str, token: Uuid) -> AppResult<Job> {
        let now = Utc::now();
        let now_ms = to_millis(now);

        let done = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET state = 'done', locked_until = NULL, lease_token = NULL, updated_at = ? \
             WHERE id = ? AND state = 'processing' AND lease_token = ? AND locked_until > ? \
             RETURNING *",
        )
        .bind(now_ms)
        .bind(id)
        .bind(token.to_string())
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to complete job '{id}'"), e))?;

        match done {
            Some(job) => {
                debug!(job_id = %job.id, "Job completed");
                Ok(job)
            }
            None => Err(self.lease_error(id, token, now, JobState::Done).await),
        }
    }

    /// Record a failed execution of a leased job.
    ///
    /// Within one transaction the job is either rescheduled with backoff or,
    /// once its retry budget is spent, moved into the DLQ.
    pub async fn fail(
        &self,
        id: &str,
        token: Uuid,
        error: &str,
        backoff: &BackoffPolicy,
    ) -> AppResult<FailureOutcome> {
        let now = Utc::now();
        let now_ms = to_millis(now);
        let error = bound_error(error);

        let mut tx = begin(&self.pool).await?;

        let held = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET last_error = ?, updated_at = ? \
             WHERE id = ? AND state = 'processing' AND lease_token = ? AND locked_until > ? \
             RETURNING *",
        )
        .bind(&error)
        .bind(now_ms)
        .bind(id)
        .bind(token.to_string())
        .bind(now_ms)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to record failure of job '{id}'"), e))?;

        let Some(job) = held else {
            tx.rollback()
                .await
                .map_err(|e| AppError::from_sqlx("Failed to roll back failure report", e))?;
            return Err(self.lease_error(id, token, now, JobState::Pending).await);
        };

        if job.can_retry() {
            job.state.ensure_transition(JobState::Pending, id)?;
            let delay = backoff.delay_for(job.retries);
            let next_run_at = offset(now, delay)?;

            let job = sqlx::query_as::<_, Job>(
                "UPDATE jobs SET state = 'pending', retries = retries + 1, next_run_at = ?, \
                 locked_until = NULL, lease_token = NULL \
                 WHERE id = ? RETURNING *",
            )
            .bind(to_millis(next_run_at))
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx(format!("Failed to reschedule job '{id}'"), e))?;

            commit(tx).await?;
            debug!(job_id = %job.id, retries = job.retries, delay_ms = delay.as_millis() as u64, "Job rescheduled");
            Ok(FailureOutcome::Retrying(job))
        } else {
            job.state.ensure_transition(JobState::Dead, id)?;
            let reason = dead_reason(job.max_retries, &error);
            let entry = bury(&mut tx, job, reason, now).await?;
            commit(tx).await?;
            debug!(job_id = %entry.id(), "Job moved to dead-letter queue");
            Ok(FailureOutcome::Dead(entry))
        }
    }

    /// Give up a lease without running the job.
    ///
    /// The job returns to `pending` with its retry count and schedule
    /// untouched, so it is immediately claimable again.
    pub async fn release(&self, id: &str, token: Uuid) -> AppResult<Job> {
        let now = Utc::now();
        let now_ms = to_millis(now);

        let released = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET state = 'pending', locked_until = NULL, lease_token = NULL, updated_at = ? \
             WHERE id = ? AND state = 'processing' AND lease_token = ? AND locked_until > ? \
             RETURNING *",
        )
        .bind(now_ms)
        .bind(id)
        .bind(token.to_string())
        .bind(now_ms)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to release job '{id}'"), e))?;

        match released {
            Some(job) => {
                debug!(job_id = %job.id, "Lease released unused");
                Ok(job)
            }
            None => Err(self.lease_error(id, token, now, JobState::Pending).await),
        }
    }

    /// Count jobs per state, including the DLQ size as `dead`.
    ///
    /// Both tables are counted from one read snapshot.
    pub async fn count_by_state(&self) -> AppResult<StateCounts> {
        let mut tx = begin(&self.pool).await?;

        let rows: Vec<(JobState, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to count jobs", e))?;

        let dead: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to count DLQ entries", e))?;

        commit(tx).await?;

        let mut counts = StateCounts::default();
        for (state, count) in rows {
            counts.set(state, count);
        }
        counts.set(JobState::Dead, dead);
        Ok(counts)
    }

    /// Explain why a lease-guarded update matched no row.
    async fn lease_error(&self, id: &str, token: Uuid, now: DateTime<Utc>, next: JobState) -> AppError {
        let job = match self.find_optional(id).await {
            Ok(Some(job)) => job,
            Ok(None) => return AppError::not_found(format!("Job '{id}' not found")),
            Err(e) => return e,
        };

        if job.lease_token != Some(token) || !job.lease_active_at(now) {
            return AppError::lease_expired(format!(
                "Lease on job '{id}' expired or was reclaimed by another worker"
            ));
        }

        match job.state.ensure_transition(next, id) {
            Err(e) => e,
            Ok(()) => AppError::internal(format!("Job '{id}' could not be updated")),
        }
    }
}

/// `now + duration`, rejecting spans that leave the representable range.
fn offset(now: DateTime<Utc>, duration: Duration) -> AppResult<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|span| now.checked_add_signed(span))
        .ok_or_else(|| {
            AppError::validation(format!(
                "Duration of {}s is out of range",
                duration.as_secs()
            ))
        })
}
