//! # queuectl-core
//!
//! Core crate for QueueCTL. Contains configuration schemas, the retry
//! backoff policy, and the unified error system.
//!
//! This crate has **no** internal dependencies on other QueueCTL crates.

pub mod backoff;
pub mod config;
pub mod error;
pub mod result;

pub use backoff::BackoffPolicy;
pub use error::{AppError, ErrorKind};
pub use result::AppResult;
