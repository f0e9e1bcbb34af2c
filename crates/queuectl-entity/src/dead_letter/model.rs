//! Dead-letter entry model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::job::{Job, JobState};
use crate::timestamp;

/// A job whose retry budget ran out, held outside the main queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Snapshot of the job at the moment it died.
    #[serde(flatten)]
    pub job: Job,
    /// When the job entered the DLQ.
    pub dead_at: DateTime<Utc>,
    /// Why the job was moved.
    pub reason: String,
}

impl DeadLetter {
    /// Wrap a job that has just exhausted its retries.
    pub fn bury(mut job: Job, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        job.state = JobState::Dead;
        job.locked_until = None;
        job.lease_token = None;
        job.updated_at = now;
        Self {
            job,
            dead_at: now,
            reason: reason.into(),
        }
    }

    /// The entry's job id.
    pub fn id(&self) -> &str {
        &self.job.id
    }

    /// Turn the entry back into a fresh pending job.
    ///
    /// The retry counter and last error are cleared; the command, id,
    /// creation time and retry budget are kept.
    pub fn into_requeued_job(self, now: DateTime<Utc>) -> Job {
        let mut job = self.job;
        job.state = JobState::Pending;
        job.retries = 0;
        job.last_error = None;
        job.next_run_at = now;
        job.locked_until = None;
        job.lease_token = None;
        job.updated_at = now;
        job
    }
}

impl<'r> FromRow<'r, SqliteRow> for DeadLetter {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let dead_at = timestamp::get(row, "dead_at")?;
        let job = Job {
            id: row.try_get("id")?,
            command: row.try_get("command")?,
            state: JobState::Dead,
            retries: row.try_get("retries")?,
            max_retries: row.try_get("max_retries")?,
            next_run_at: dead_at,
            locked_until: None,
            lease_token: None,
            last_error: row.try_get("last_error")?,
            created_at: timestamp::get(row, "created_at")?,
            updated_at: dead_at,
        };
        Ok(Self {
            job,
            dead_at,
            reason: row.try_get("reason")?,
        })
    }
}

/// Standard reason recorded when a job exhausts its retry budget.
pub fn dead_reason(max_retries: u32, last_error: &str) -> String {
    format!("Max retries ({max_retries}) exceeded. Last error: {last_error}")
}
