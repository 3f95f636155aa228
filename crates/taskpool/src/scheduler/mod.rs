//! Deferred and periodic task execution
//!
//! This module provides:
//! - [`DelayedTaskScheduler`] - Run a callable once after a delay, keyed by [`TaskId`]
//! - [`PeriodicActuator`] - Run a [`TimerTask`] at a fixed interval until stopped
//!
//! Both are independent of the [`WorkerPool`](crate::WorkerPool): they share no
//! lock with it and give no ordering guarantee relative to it.

mod delayed;
mod periodic;

pub use delayed::DelayedTaskScheduler;
pub use periodic::{PeriodicActuator, TimerTask};

use crate::handle::TaskError;

/// Identifier of a scheduled task, allocated sequentially per scheduler
pub type TaskId = u64;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Rejected before entering the scheduler (negative delay, zero interval)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Unknown id, cancelled task, or result already taken
    #[error("no result available for task {0}")]
    NotFound(TaskId),

    /// The task body failed
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The scheduler was shut down
    #[error("scheduler is shut down")]
    Stopped,

    /// `start` called on a running actuator
    #[error("actuator is already running")]
    AlreadyRunning,

    /// The timer runtime or thread could not be started
    #[error("failed to start timer runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
