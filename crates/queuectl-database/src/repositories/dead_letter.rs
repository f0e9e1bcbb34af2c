//! Dead-letter queue repository implementation.

use chrono::Utc;
use sqlx::SqlitePool;

use queuectl_core::error::AppError;
use queuectl_core::result::AppResult;
use queuectl_entity::dead_letter::DeadLetter;
use queuectl_entity::job::Job;
use queuectl_entity::timestamp::to_millis;

use super::{begin, bury, commit};

/// Repository for DLQ entries.
#[derive(Debug, Clone)]
pub struct DeadLetterRepository {
    pool: SqlitePool,
}

impl DeadLetterRepository {
    /// Create a new dead-letter repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Move a job out of the main queue into the DLQ.
    ///
    /// Administrative path: the job's lease is ignored. Jobs that already
    /// finished successfully cannot be moved.
    pub async fn move_job(&self, job_id: &str, reason: &str) -> AppResult<DeadLetter> {
        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        let job = sqlx::query_as::<_, Job>(
            "UPDATE jobs SET updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(to_millis(now))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to load job '{job_id}'"), e))?
        .ok_or_else(|| AppError::not_found(format!("Job '{job_id}' not found")))?;

        if job.state.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "Job '{job_id}' is {} and cannot be moved to the dead-letter queue",
                job.state
            )));
        }

        let entry = bury(&mut tx, job, reason.to_string(), now).await?;
        commit(tx).await?;
        Ok(entry)
    }

    /// Find a DLQ entry by job ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<DeadLetter> {
        sqlx::query_as::<_, DeadLetter>("SELECT * FROM dead_letters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to find DLQ entry", e))?
            .ok_or_else(|| AppError::not_found(format!("Job '{id}' not found in dead-letter queue")))
    }

    /// List DLQ entries, most recently dead first.
    pub async fn list(&self, limit: Option<u32>) -> AppResult<Vec<DeadLetter>> {
        sqlx::query_as::<_, DeadLetter>(
            "SELECT * FROM dead_letters ORDER BY dead_at DESC, id ASC LIMIT ?",
        )
        .bind(limit.map_or(-1, i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to list DLQ entries", e))
    }

    /// Put a DLQ entry back on the main queue as a fresh pending job.
    ///
    /// The retry counter and last error are reset; the retry budget is kept.
    pub async fn requeue(&self, id: &str) -> AppResult<Job> {
        let now = Utc::now();
        let mut tx = begin(&self.pool).await?;

        let entry = sqlx::query_as::<_, DeadLetter>(
            "DELETE FROM dead_letters WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to remove DLQ entry '{id}'"), e))?
        .ok_or_else(|| AppError::not_found(format!("Job '{id}' not found in dead-letter queue")))?;

        entry.job.state.ensure_transition(queuectl_entity::JobState::Pending, id)?;
        let job = entry.into_requeued_job(now);

        let job = sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, command, state, retries, max_retries, next_run_at, created_at, updated_at) \
             VALUES (?, ?, 'pending', ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.retries)
        .bind(job.max_retries)
        .bind(to_millis(job.next_run_at))
        .bind(to_millis(job.created_at))
        .bind(to_millis(job.updated_at))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to requeue job '{id}'"), e))?;

        commit(tx).await?;
        Ok(job)
    }

    /// Permanently delete a DLQ entry.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM dead_letters WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to delete DLQ entry", e))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Job '{id}' not found in dead-letter queue"
            )));
        }
        Ok(())
    }

    /// Number of entries in the DLQ.
    pub async fn count(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to count DLQ entries", e))
    }
}
