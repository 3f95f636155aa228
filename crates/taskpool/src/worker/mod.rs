//! Worker pool for task execution
//!
//! This module provides:
//! - [`WorkerPool`] - Bounded pool of OS worker threads with dynamic scaling
//! - [`BoundedTaskQueue`] - Fixed-capacity FIFO with reject-on-full
//! - [`PoolStatus`] - Lifecycle state (graceful vs immediate shutdown)
//! - [`PoolStats`] - Counter snapshot for introspection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       WorkerPool                             │
//! │                                                              │
//! │   submit() ──► ┌─────────────────────────────────────────┐  │
//! │                │  Mutex<PoolState>                        │  │
//! │                │  BoundedTaskQueue · active · idle · stop │  │
//! │                └───────────────────┬─────────────────────┘  │
//! │                                    │ Condvar                 │
//! │                                    ▼                         │
//! │   ┌──────────┐ ┌──────────┐     ┌──────────┐                │
//! │   │ worker 0 │ │ worker 1 │ ... │ worker N │  (core..=max)  │
//! │   └────┬─────┘ └────┬─────┘     └────┬─────┘                │
//! │        └────────────┴──── ResultHandle ◄── outcome           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use taskpool::worker::{WorkerPool, SubmitError};
//! use taskpool::WorkerPoolConfig;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new(1, 4, 16, Duration::from_secs(10)))?;
//!
//! let handle = pool.submit(|| "done")?;
//! assert_eq!(handle.join(), Ok("done"));
//!
//! // Graceful shutdown, then new work is refused
//! pool.shutdown();
//! assert_eq!(pool.submit(|| ()).unwrap_err(), SubmitError::Stopped);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod lifecycle;
mod pool;
mod queue;
mod stats;

pub use lifecycle::PoolStatus;
pub use pool::{SubmitError, WorkerPool, WorkerPoolError, WorkerState};
pub use queue::{BoundedTaskQueue, QueueFull};
pub use stats::PoolStats;
