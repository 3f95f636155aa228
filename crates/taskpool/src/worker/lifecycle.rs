//! Pool lifecycle: graceful and immediate shutdown
//!
//! # State Machine
//!
//! ```text
//! ┌─────────┐  shutdown / shutdown_now  ┌──────────┐  last worker exits  ┌─────────┐
//! │ Running │ ────────────────────────► │ Draining │ ──────────────────► │ Stopped │
//! └─────────┘                           └──────────┘                     └─────────┘
//! ```
//!
//! The last exiting worker marks the pool stopped, so a shutdown requested
//! from inside a task still reaches `Stopped` without an outside caller.
//!
//! Once shutdown begins, `submit` fails with [`SubmitError::Stopped`].
//!
//! [`SubmitError::Stopped`]: super::SubmitError::Stopped

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::pool::WorkerPool;

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting and executing tasks
    Running,
    /// Shutdown initiated; workers finishing (graceful) or dropping (immediate) queued work
    Draining,
    /// Every worker has exited
    Stopped,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl WorkerPool {
    /// Current lifecycle status
    pub fn status(&self) -> PoolStatus {
        self.shared.state.lock().status
    }

    /// Whether `submit` currently accepts tasks
    pub fn is_accepting(&self) -> bool {
        !self.shared.state.lock().stopping
    }

    /// Stop accepting tasks, run everything already queued, then stop
    ///
    /// Blocks until every worker has exited, at which point every task
    /// accepted before the call has had its handle completed. Calling it again
    /// after the pool stopped returns immediately.
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.status == PoolStatus::Stopped {
                return;
            }
            if !state.stopping {
                info!(queued = state.queue.len(), "Initiating graceful shutdown");
            }
            state.stopping = true;
            state.status = PoolStatus::Draining;
        }

        self.shared.work_available.notify_all();
        self.await_workers();
    }

    /// Stop accepting tasks, drop everything still queued, then stop
    ///
    /// Tasks already executing run to completion. Handles of dropped tasks
    /// resolve to [`TaskError::Discarded`] and never yield a value. Returns
    /// the number of dropped tasks.
    ///
    /// [`TaskError::Discarded`]: crate::TaskError::Discarded
    #[instrument(skip(self))]
    pub fn shutdown_now(&self) -> usize {
        let discarded = {
            let mut state = self.shared.state.lock();
            state.stopping = true;
            if state.status == PoolStatus::Running {
                state.status = PoolStatus::Draining;
            }
            state.queue.drain()
        };

        // Dropping the jobs outside the lock resolves their handles
        let count = discarded.len();
        drop(discarded);
        self.shared.counters.tasks_discarded(count);
        info!(discarded = count, "Immediate shutdown, queued tasks dropped");

        self.shared.work_available.notify_all();
        self.await_workers();
        count
    }

    /// Join worker threads and wait until none is alive
    fn await_workers(&self) {
        if self.on_worker_thread() {
            // A worker cannot wait for itself; it exits once it returns to its loop
            warn!("Shutdown requested from a worker thread, not waiting for workers");
            return;
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                error!("Worker thread panicked outside of a task");
            }
        }

        // Another caller may have taken some handles; wait on the live count too
        let mut state = self.shared.state.lock();
        while state.active_threads > 0 {
            self.shared.worker_exited.wait(&mut state);
        }
        if state.status != PoolStatus::Stopped {
            state.status = PoolStatus::Stopped;
            info!("Worker pool stopped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.status() != PoolStatus::Stopped {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerPoolConfig;
    use crate::handle::TaskError;
    use crate::worker::SubmitError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(core: usize, max: usize) -> WorkerPoolConfig {
        WorkerPoolConfig::new(core, max, 32, Duration::from_millis(50))
    }

    #[test]
    fn test_pool_is_shareable_across_threads() {
        fn is_send_sync<T: Send + Sync>() {}
        is_send_sync::<WorkerPool>();
    }

    #[test]
    fn test_status_transitions() {
        let pool = WorkerPool::new(config(2, 2)).unwrap();
        assert_eq!(pool.status(), PoolStatus::Running);
        assert!(pool.is_accepting());

        pool.shutdown();
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert!(!pool.is_accepting());
        assert_eq!(pool.active_thread_count(), 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = WorkerPool::new(config(1, 1)).unwrap();
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.shutdown_now(), 0);
        assert_eq!(pool.status(), PoolStatus::Stopped);
    }

    #[test]
    fn test_submit_after_shutdown_fails_fast() {
        let pool = WorkerPool::new(config(1, 1)).unwrap();
        pool.shutdown();
        assert_eq!(pool.submit(|| 1).unwrap_err(), SubmitError::Stopped);
        assert_eq!(pool.stats().rejected, 1);
    }

    #[test]
    fn test_shutdown_from_inside_a_task_does_not_deadlock() {
        let pool = Arc::new(WorkerPool::new(config(1, 1)).unwrap());
        let counter = Arc::new(AtomicUsize::new(0));

        let inner_pool = Arc::clone(&pool);
        let inner_counter = Arc::clone(&counter);
        let handle = pool
            .submit(move || {
                inner_pool.shutdown();
                inner_counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(handle.join(), Ok(()));
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status(), PoolStatus::Stopped);
    }

    #[test]
    fn test_shutdown_from_inside_a_task_reaches_stopped() {
        let pool = Arc::new(WorkerPool::new(config(2, 2)).unwrap());

        let inner_pool = Arc::clone(&pool);
        let handle = pool.submit(move || inner_pool.shutdown()).unwrap();
        assert_eq!(handle.join(), Ok(()));

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.status() != PoolStatus::Stopped && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert_eq!(pool.active_thread_count(), 0);
    }

    #[test]
    fn test_shutdown_now_during_graceful_drain_discards_remaining() {
        let pool = Arc::new(WorkerPool::new(config(1, 1)).unwrap());
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let blocker = pool.submit(move || release_rx.recv().unwrap()).unwrap();
        let queued: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();

        let graceful_pool = Arc::clone(&pool);
        let graceful = std::thread::spawn(move || graceful_pool.shutdown());
        while pool.status() != PoolStatus::Draining {
            std::thread::sleep(Duration::from_millis(1));
        }

        // The single worker is held by the blocker, so only the discard can empty the queue
        let release_pool = Arc::clone(&pool);
        let releaser = std::thread::spawn(move || {
            while release_pool.queue_size() > 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            release_tx.send(()).unwrap();
        });

        assert_eq!(pool.shutdown_now(), 3);
        releaser.join().unwrap();
        graceful.join().unwrap();

        assert_eq!(blocker.join(), Ok(()));
        for handle in queued {
            assert_eq!(handle.join(), Err(TaskError::Discarded));
        }
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert_eq!(pool.stats().discarded, 3);
    }

    #[test]
    fn test_shutdown_now_reports_discarded_handles() {
        let pool = WorkerPool::new(config(1, 1)).unwrap();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let running = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                "finished"
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            release_tx.send(()).unwrap();
        });

        assert_eq!(pool.shutdown_now(), 3);
        releaser.join().unwrap();

        assert_eq!(running.join(), Ok("finished"));
        for handle in queued {
            assert_eq!(handle.join(), Err(TaskError::Discarded));
        }
        assert_eq!(pool.stats().discarded, 3);
    }
}
