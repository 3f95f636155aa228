//! # Taskpool
//!
//! An in-process concurrent task execution core.
//!
//! ## Features
//!
//! - **Bounded worker pool**: Reject-on-full backpressure instead of unbounded buffering
//! - **Dynamic scaling**: Grows from `core_threads` up to `max_threads` under load, retires idle extras
//! - **Result handles**: Every submission yields a single-shot handle carrying a value or a captured panic
//! - **Graceful and immediate shutdown**: Drain the queue, or discard it and stop
//! - **Delayed tasks**: Run a callable once after a delay, with cancellation and destructive result reads
//! - **Periodic tasks**: Run a callable at a fixed interval until stopped
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                            │
//! │  (BoundedTaskQueue + core..=max OS worker threads)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ResultHandle                           │
//! │  (oneshot: value, Panicked, or Discarded)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │           DelayedTaskScheduler · PeriodicActuator            │
//! │  (tokio timers, independent of the pool)                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use taskpool::prelude::*;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new(2, 4, 64, Duration::from_secs(30)))?;
//!
//! let handles: Vec<_> = (0..8)
//!     .map(|i| pool.submit(move || i * i))
//!     .collect::<Result<_, _>>()?;
//!
//! let squares: Vec<u32> = handles
//!     .into_iter()
//!     .map(|h| h.join())
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(squares, vec![0, 1, 4, 9, 16, 25, 36, 49]);
//!
//! pool.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod handle;
pub mod scheduler;
pub mod telemetry;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{ConfigError, SchedulerConfig, WorkerPoolConfig};
    pub use crate::handle::{ResultHandle, TaskError};
    pub use crate::scheduler::{
        DelayedTaskScheduler, PeriodicActuator, SchedulerError, TaskId, TimerTask,
    };
    pub use crate::worker::{PoolStats, PoolStatus, SubmitError, WorkerPool, WorkerPoolError};
}

// Re-export key types at crate root
pub use config::{ConfigError, SchedulerConfig, WorkerPoolConfig};
pub use handle::{ResultHandle, TaskError};
pub use scheduler::{DelayedTaskScheduler, PeriodicActuator, SchedulerError, TaskId, TimerTask};
pub use worker::{
    BoundedTaskQueue, PoolStats, PoolStatus, QueueFull, SubmitError, WorkerPool, WorkerPoolError,
    WorkerState,
};
