//! Dead-letter queue entities.

pub mod model;

pub use model::{DeadLetter, dead_reason};
