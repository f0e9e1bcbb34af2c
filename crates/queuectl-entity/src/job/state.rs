//! Job lifecycle states and the legal transitions between them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use queuectl_core::error::AppError;

/// Lifecycle state of a job.
///
/// ```text
/// pending ──claim──▶ processing ──success──▶ done
///    ▲                 │   │  ▲
///    └──retry(backoff)─┘   │  └─reclaim (expired lease)
///    ▲                     └──retries exhausted──▶ dead
///    └──────────────dlq retry──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for `next_run_at` and a free worker.
    Pending,
    /// Claimed by a worker holding a lease.
    Processing,
    /// Finished successfully.
    Done,
    /// Retry budget exhausted; lives in the dead-letter queue.
    Dead,
}

impl JobState {
    /// All states, in lifecycle order.
    pub const ALL: [JobState; 4] = [Self::Pending, Self::Processing, Self::Done, Self::Dead];

    /// Check if the state is terminal for the main queue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Dead)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Processing)
                | (Processing, Done)
                | (Processing, Pending)
                | (Processing, Dead)
                | (Dead, Pending)
        )
    }

    /// Return `Ok` if the transition is legal, otherwise an
    /// `InvalidTransition` error naming the job.
    pub fn ensure_transition(&self, next: JobState, job_id: &str) -> Result<(), AppError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::invalid_transition(format!(
                "Job '{job_id}' cannot move from {self} to {next}"
            )))
        }
    }

    /// Return the state as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" | "completed" => Ok(Self::Done),
            "dead" => Ok(Self::Dead),
            other => Err(AppError::validation(format!(
                "Unknown job state '{other}' (expected pending, processing, done, dead)"
            ))),
        }
    }
}

/// Number of jobs in each state of the main queue plus the DLQ size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    /// Jobs waiting to run.
    pub pending: i64,
    /// Jobs currently leased.
    pub processing: i64,
    /// Jobs finished successfully.
    pub done: i64,
    /// Entries in the dead-letter queue.
    pub dead: i64,
}

impl StateCounts {
    /// Record `count` jobs in `state`.
    pub fn set(&mut self, state: JobState, count: i64) {
        match state {
            JobState::Pending => self.pending = count,
            JobState::Processing => self.processing = count,
            JobState::Done => self.done = count,
            JobState::Dead => self.dead = count,
        }
    }

    /// Count for a single state.
    pub fn get(&self, state: JobState) -> i64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Done => self.done,
            JobState::Dead => self.dead,
        }
    }

    /// Total across all states.
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.done + self.dead
    }
}
