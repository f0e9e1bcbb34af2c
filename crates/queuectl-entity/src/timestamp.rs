//! Column conversions shared by the row types.
//!
//! Timestamps are stored as integer Unix milliseconds so that SQL
//! comparisons such as `next_run_at <= ?` are numeric.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

/// Convert a timestamp to Unix milliseconds.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert Unix milliseconds back into a timestamp.
pub fn from_millis(ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| sqlx::Error::Decode(format!("timestamp out of range: {ms}").into()))
}

/// Read a non-null millisecond column.
pub(crate) fn get(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    from_millis(row.try_get::<i64, _>(column)?)
}

/// Read a nullable millisecond column.
pub(crate) fn get_opt(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    row.try_get::<Option<i64>, _>(column)?
        .map(from_millis)
        .transpose()
}

/// Read a nullable lease token stored as hyphenated text.
pub(crate) fn get_token(row: &SqliteRow, column: &str) -> Result<Option<Uuid>, sqlx::Error> {
    row.try_get::<Option<String>, _>(column)?
        .map(|raw| {
            Uuid::parse_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(e),
            })
        })
        .transpose()
}
