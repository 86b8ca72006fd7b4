//! Scheduler Error Types

use thiserror::Error;

/// Errors raised while building or configuring the task table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A task period of zero would run the task on every pass forever
    #[error("task '{0}' has a zero period")]
    ZeroPeriod(&'static str),

    /// No free slot left in the fixed table
    #[error("task table full ({capacity} slots), cannot register '{name}'")]
    TableFull {
        name: &'static str,
        capacity: usize,
    },

    /// Id does not refer to a registered task
    #[error("no task registered with id {0}")]
    UnknownTask(usize),
}
