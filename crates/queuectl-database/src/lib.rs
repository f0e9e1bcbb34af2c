//! # queuectl-database
//!
//! SQLite connection management and the repositories backing the job
//! queue and the dead-letter queue.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{DeadLetterRepository, JobRepository};
