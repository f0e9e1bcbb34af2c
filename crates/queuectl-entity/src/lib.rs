//! # queuectl-entity
//!
//! Domain entity models for QueueCTL. Every struct in this crate represents
//! a database table row or a domain value object. Row types implement
//! `sqlx::FromRow` for SQLite, converting the millisecond timestamp
//! columns into `chrono` values.

pub mod dead_letter;
pub mod job;
pub mod timestamp;

pub use dead_letter::DeadLetter;
pub use job::{FailureOutcome, Job, JobState, Lease, NewJob, StateCounts};
