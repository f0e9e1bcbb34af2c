//! Repository implementations for the job queue and the dead-letter queue.

pub mod dead_letter;
pub mod job;

pub use dead_letter::DeadLetterRepository;
pub use job::JobRepository;

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

use queuectl_core::error::AppError;
use queuectl_core::result::AppResult;
use queuectl_entity::dead_letter::DeadLetter;
use queuectl_entity::job::Job;
use queuectl_entity::timestamp::to_millis;

/// Upper bound on stored failure messages, in characters.
pub const MAX_ERROR_CHARS: usize = 4000;

/// Keep the tail of an error message within [`MAX_ERROR_CHARS`].
pub fn bound_error(message: &str) -> String {
    let count = message.chars().count();
    if count <= MAX_ERROR_CHARS {
        return message.to_string();
    }
    message.chars().skip(count - MAX_ERROR_CHARS).collect()
}

/// Move a job row into the DLQ inside an open transaction.
///
/// The caller must already hold the write lock (the transaction's first
/// statement must have been a write) so that no reader ever observes the job
/// in both tables or in neither.
pub(crate) async fn bury(
    tx: &mut Transaction<'_, Sqlite>,
    job: Job,
    reason: String,
    now: DateTime<Utc>,
) -> AppResult<DeadLetter> {
    let entry = DeadLetter::bury(job, reason, now);

    sqlx::query(
        "INSERT INTO dead_letters (id, command, retries, max_retries, last_error, reason, created_at, dead_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.job.id)
    .bind(&entry.job.command)
    .bind(entry.job.retries)
    .bind(entry.job.max_retries)
    .bind(&entry.job.last_error)
    .bind(&entry.reason)
    .bind(to_millis(entry.job.created_at))
    .bind(to_millis(entry.dead_at))
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::from_sqlx(format!("Failed to insert DLQ entry '{}'", entry.id()), e))?;

    sqlx::query("DELETE FROM jobs WHERE id = ?")
        .bind(&entry.job.id)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::from_sqlx(format!("Failed to remove job '{}'", entry.id()), e))?;

    Ok(entry)
}

/// Begin a transaction, mapping pool errors into [`AppError`].
pub(crate) async fn begin(pool: &sqlx::SqlitePool) -> AppResult<Transaction<'static, Sqlite>> {
    pool.begin()
        .await
        .map_err(|e| AppError::from_sqlx("Failed to begin transaction", e))
}

/// Commit a transaction, mapping errors into [`AppError`].
pub(crate) async fn commit(tx: Transaction<'_, Sqlite>) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| AppError::from_sqlx("Failed to commit transaction", e))
}
