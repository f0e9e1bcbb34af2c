//! Job domain entities.

pub mod model;
pub mod state;

pub use model::{FailureOutcome, Job, Lease, NewJob, generate_job_id};
pub use state::{JobState, StateCounts};
