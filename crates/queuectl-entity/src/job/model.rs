//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::state::JobState;
use crate::dead_letter::DeadLetter;
use crate::timestamp;

/// Length of generated job identifiers.
const GENERATED_ID_LEN: usize = 8;

/// A shell-command job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Shell command text, run with `sh -c`.
    pub command: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Failed attempts so far.
    pub retries: u32,
    /// Retry budget captured at enqueue time.
    pub max_retries: u32,
    /// Earliest time the job may be claimed.
    pub next_run_at: DateTime<Utc>,
    /// Lease expiry while a worker holds the job.
    pub locked_until: Option<DateTime<Utc>>,
    /// Token identifying the current lease holder.
    pub lease_token: Option<Uuid>,
    /// Most recent failure message.
    pub last_error: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether a worker may claim the job at `now`.
    ///
    /// Mirrors the claim predicate in the job repository: a pending job whose
    /// run time has arrived, or any job whose lease has expired.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        let due = self.state == JobState::Pending && self.next_run_at <= now;
        let lease_expired = self.locked_until.is_some_and(|until| until < now);
        due || lease_expired
    }

    /// Whether a lease is held and still valid at `now`.
    pub fn lease_active_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Whether another failure would still be retried.
    pub fn can_retry(&self) -> bool {
        queuectl_core::backoff::should_retry(self.retries, self.max_retries)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Job {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            command: row.try_get("command")?,
            state: row.try_get("state")?,
            retries: row.try_get("retries")?,
            max_retries: row.try_get("max_retries")?,
            next_run_at: timestamp::get(row, "next_run_at")?,
            locked_until: timestamp::get_opt(row, "locked_until")?,
            lease_token: timestamp::get_token(row, "lease_token")?,
            last_error: row.try_get("last_error")?,
            created_at: timestamp::get(row, "created_at")?,
            updated_at: timestamp::get(row, "updated_at")?,
        })
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    /// Caller-supplied id, or `None` to generate one.
    #[serde(default)]
    pub id: Option<String>,
    /// Shell command text.
    pub command: String,
    /// Retry budget; `None` takes the configured default.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl NewJob {
    /// A job with only a command; id and retry budget are defaulted.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            id: None,
            command: command.into(),
            max_retries: None,
        }
    }

    /// Set an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set an explicit retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Generate a short opaque job id.
pub fn generate_job_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_ID_LEN);
    id
}

/// A time-bounded exclusive claim on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    /// The job as it was when the lease was granted.
    pub job: Job,
    /// Token that must accompany the outcome report.
    pub token: Uuid,
    /// When the lease lapses.
    pub locked_until: DateTime<Utc>,
}

impl Lease {
    /// The leased job's id.
    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    /// Whether the lease is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until > now
    }
}

/// Result of reporting a failed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FailureOutcome {
    /// Rescheduled with backoff; the job is pending again.
    Retrying(Job),
    /// Retry budget exhausted; the job now lives in the DLQ.
    Dead(DeadLetter),
}
