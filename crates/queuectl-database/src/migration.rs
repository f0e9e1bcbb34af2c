//! Embedded schema migrations for the `jobs` and `dead_letters` tables.

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;

use queuectl_core::error::{AppError, ErrorKind};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Bring the schema up to date. Safe to call from every process on startup;
/// already-applied migrations are skipped.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), AppError> {
    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, format!("Schema migration failed: {e}"), e)
    })?;

    tracing::debug!(migrations = MIGRATOR.iter().count(), "Schema up to date");
    Ok(())
}
