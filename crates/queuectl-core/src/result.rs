//! Convenience result type alias for QueueCTL.

use crate::error::AppError;

/// A specialized `Result` type for QueueCTL operations.
pub type AppResult<T> = Result<T, AppError>;
