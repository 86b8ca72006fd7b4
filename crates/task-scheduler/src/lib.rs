//! Cooperative Task Scheduler
//!
//! Runs a fixed table of periodic tasks from a single, non-preemptive context.
//! Table order is priority order: every pass checks tasks first-registered
//! first, so latency-sensitive work belongs at the front.

mod error;
mod scheduler;

pub use error::SchedulerError;
pub use scheduler::{Scheduler, SchedulerBuilder, Task, TaskId, TaskStats};
