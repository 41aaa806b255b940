//! Queues: admission, withdrawal and the periodic matching tick
//!
//! Each queue runs one strategy and serializes all mutation through a
//! single lock, so admissions, withdrawals and ticks never interleave.

pub mod instance;
pub mod registry;

pub use instance::{Queue, QueueSnapshot};
pub use registry::QueueRegistry;
