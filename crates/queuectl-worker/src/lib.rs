//! Job processing for QueueCTL.
//!
//! This crate provides:
//! - A lease manager granting exclusive, time-bounded claims on jobs
//! - A command executor running job commands through `sh -c`
//! - A worker runner that polls, executes and reports outcomes
//! - A worker pool running several runners until shutdown
//! - The submission/inspection facade and the dead-letter queue manager

pub mod dlq;
pub mod executor;
pub mod lease;
pub mod pool;
pub mod queue;
pub mod runner;

pub use dlq::DlqManager;
pub use executor::{CommandRunner, ExecutionReport, JobExecutionError, JobExecutor, ShellRunner};
pub use lease::{Acquire, LeaseManager};
pub use pool::{WorkerPool, shutdown_signal};
pub use queue::JobQueue;
pub use runner::{CycleOutcome, WorkerPhase, WorkerRunner};
