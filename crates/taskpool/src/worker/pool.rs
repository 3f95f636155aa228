//! Worker pool for task execution
//!
//! Long-lived OS threads pull tasks from a shared [`BoundedTaskQueue`]. One
//! mutex guards the queue, the worker counters and the stopping flag; one
//! condition variable carries every wakeup.
//!
//! The pool starts `core_threads` workers eagerly and adds workers up to
//! `max_threads` when queued work outnumbers idle workers. A worker that waits
//! longer than `idle_timeout` while more than `core_threads` workers are alive
//! retires.

use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, trace, warn};

use super::lifecycle::PoolStatus;
use super::queue::BoundedTaskQueue;
use super::stats::{PoolCounters, PoolStats};
use crate::config::{ConfigError, WorkerPoolConfig};
use crate::handle::{self, ResultHandle, TaskError};

/// Worker pool construction errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerPoolError {
    /// Configuration rejected by validation
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// The OS refused to start a core worker
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Synchronous submission failures
///
/// These never reach the task's [`ResultHandle`]; no handle is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Queue at capacity; retry later or back off
    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Shutdown has been initiated
    #[error("worker pool is shutting down")]
    Stopped,
}

/// Lifecycle of a single worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for work
    Idle,
    /// Running a task
    Executing,
    /// Idle timeout elapsed above the core count
    Retiring,
    /// Thread is about to exit
    Terminated,
}

pub(super) enum JobOutcome {
    Completed,
    Panicked(TaskError),
}

pub(super) type Job = Box<dyn FnOnce() -> JobOutcome + Send + 'static>;

thread_local! {
    /// Identity of the pool owning the current worker thread (0 outside workers)
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// State guarded by the pool lock
pub(super) struct PoolState {
    pub(super) queue: BoundedTaskQueue<Job>,
    pub(super) active_threads: usize,
    pub(super) idle_threads: usize,
    pub(super) stopping: bool,
    pub(super) status: PoolStatus,
    next_worker_id: usize,
}

impl PoolState {
    /// Account for an exiting worker; true when it was the last one of a stopping pool
    fn release_worker(&mut self) -> bool {
        self.active_threads -= 1;
        if self.stopping && self.active_threads == 0 && self.status != PoolStatus::Stopped {
            self.status = PoolStatus::Stopped;
            return true;
        }
        false
    }
}

pub(super) struct Shared {
    pub(super) config: WorkerPoolConfig,
    pub(super) state: Mutex<PoolState>,
    /// Signalled on submit and on shutdown
    pub(super) work_available: Condvar,
    /// Signalled whenever a worker exits
    pub(super) worker_exited: Condvar,
    pub(super) counters: PoolCounters,
}

/// Bounded worker pool with dynamic thread scaling
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskpool::{WorkerPool, WorkerPoolConfig};
///
/// let pool = WorkerPool::new(WorkerPoolConfig::new(2, 4, 64, Duration::from_secs(5)))?;
///
/// let handles: Vec<_> = (0..8u64)
///     .map(|n| pool.submit(move || n * n))
///     .collect::<Result<_, _>>()?;
///
/// let sum: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
/// assert_eq!(sum, 140);
///
/// pool.shutdown();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct WorkerPool {
    pub(super) shared: Arc<Shared>,
    pub(super) workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Validate the configuration and start the core workers
    pub fn new(config: WorkerPoolConfig) -> Result<Self, WorkerPoolError> {
        config.validate()?;

        info!(
            core_threads = config.core_threads,
            max_threads = config.max_threads,
            queue_capacity = config.queue_capacity,
            idle_timeout_ms = config.idle_timeout.as_millis() as u64,
            "Starting worker pool"
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: BoundedTaskQueue::new(config.queue_capacity),
                active_threads: 0,
                idle_threads: 0,
                stopping: false,
                status: PoolStatus::Running,
                next_worker_id: 0,
            }),
            work_available: Condvar::new(),
            worker_exited: Condvar::new(),
            counters: PoolCounters::default(),
            config,
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::new()),
        };

        // On failure the partially started pool is dropped, which shuts it down
        let started = {
            let mut state = pool.shared.state.lock();
            (0..pool.shared.config.core_threads).try_for_each(|_| pool.spawn_worker(&mut state))
        };
        started?;

        Ok(pool)
    }

    /// Queue a task and return the handle its outcome will be delivered to
    ///
    /// Never blocks on a full queue: the call fails with
    /// [`SubmitError::QueueFull`] instead. A panic inside `task` is captured
    /// into the handle and does not affect the worker that ran it.
    pub fn submit<F, R>(&self, task: F) -> Result<ResultHandle<R>, SubmitError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (completer, handle) = handle::channel();
        let job: Job = Box::new(move || {
            let outcome = handle::run_catching(task);
            let failure = outcome.as_ref().err().cloned();
            // Delivery drops the value when the handle is gone, and that drop may panic too
            match (completer.deliver(outcome), failure) {
                (Err(drop_panic), _) => JobOutcome::Panicked(drop_panic),
                (Ok(_), Some(err)) => JobOutcome::Panicked(err),
                (Ok(_), None) => JobOutcome::Completed,
            }
        });

        let mut state = self.shared.state.lock();

        if state.stopping {
            self.shared.counters.task_rejected();
            debug!("Rejecting task: pool is shutting down");
            return Err(SubmitError::Stopped);
        }

        if state.queue.push(job).is_err() {
            self.shared.counters.task_rejected();
            let capacity = state.queue.capacity();
            debug!(capacity, "Rejecting task: queue is full");
            return Err(SubmitError::QueueFull { capacity });
        }
        self.shared.counters.task_submitted();

        // Grow when queued work outnumbers the workers waiting for it
        if state.queue.len() > state.idle_threads
            && state.active_threads < self.shared.config.max_threads
        {
            if let Err(e) = self.spawn_worker(&mut state) {
                warn!(error = %e, "Failed to spawn additional worker, task stays queued");
            }
        }
        drop(state);

        self.shared.work_available.notify_one();
        Ok(handle)
    }

    /// Number of live worker threads
    pub fn active_thread_count(&self) -> usize {
        self.shared.state.lock().active_threads
    }

    /// Number of workers currently waiting for work
    pub fn idle_thread_count(&self) -> usize {
        self.shared.state.lock().idle_threads
    }

    /// Number of queued, not yet dispatched tasks
    pub fn queue_size(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Maximum number of queued tasks
    pub fn queue_capacity(&self) -> usize {
        self.shared.config.queue_capacity
    }

    /// The configuration this pool was built with
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.shared.config
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot()
    }

    /// Whether the calling thread is one of this pool's workers
    pub(super) fn on_worker_thread(&self) -> bool {
        CURRENT_POOL.with(|current| current.get() == self.pool_id())
    }

    fn pool_id(&self) -> usize {
        Arc::as_ptr(&self.shared) as usize
    }

    /// Start one worker; the caller holds the pool lock
    fn spawn_worker(&self, state: &mut PoolState) -> io::Result<()> {
        let worker = Worker {
            id: state.next_worker_id,
            pool_id: self.pool_id(),
            shared: Arc::clone(&self.shared),
            state: WorkerState::Idle,
        };
        let name = format!("{}-{}", self.shared.config.thread_name, worker.id);

        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())?;

        state.next_worker_id += 1;
        state.active_threads += 1;
        self.shared.counters.worker_spawned();

        let mut workers = self.workers.lock();
        workers.retain(|h| !h.is_finished());
        workers.push(handle);
        Ok(())
    }
}

struct Worker {
    id: usize,
    pool_id: usize,
    shared: Arc<Shared>,
    state: WorkerState,
}

impl Worker {
    fn run(mut self) {
        CURRENT_POOL.with(|current| current.set(self.pool_id));
        debug!(worker_id = self.id, "Worker started");

        let shared = Arc::clone(&self.shared);
        let config = &shared.config;
        let mut state = shared.state.lock();

        loop {
            if let Some(job) = state.queue.pop() {
                self.transition(WorkerState::Executing);
                let outcome = MutexGuard::unlocked(&mut state, job);
                self.record(outcome);
                self.transition(WorkerState::Idle);
                continue;
            }

            if state.stopping {
                break;
            }

            state.idle_threads += 1;
            // At or below the core count there is nothing to retire, so wait untimed
            let timed_out = if state.active_threads > config.core_threads {
                shared
                    .work_available
                    .wait_for(&mut state, config.idle_timeout)
                    .timed_out()
            } else {
                shared.work_available.wait(&mut state);
                false
            };
            state.idle_threads -= 1;

            if timed_out
                && state.queue.is_empty()
                && !state.stopping
                && state.active_threads > config.core_threads
            {
                self.transition(WorkerState::Retiring);
                shared.counters.worker_retired();
                self.exit(state);
                debug!(worker_id = self.id, "Worker retired after idle timeout");
                return;
            }
        }

        self.exit(state);
        debug!(worker_id = self.id, "Worker exited on shutdown");
    }

    fn exit(&mut self, mut state: MutexGuard<'_, PoolState>) {
        let pool_stopped = state.release_worker();
        drop(state);
        self.shared.worker_exited.notify_all();
        self.transition(WorkerState::Terminated);
        if pool_stopped {
            info!("Worker pool stopped");
        }
    }

    fn record(&self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed => self.shared.counters.task_completed(),
            JobOutcome::Panicked(err) => {
                self.shared.counters.task_panicked();
                warn!(worker_id = self.id, error = %err, "Task panicked, worker continues");
            }
        }
    }

    fn transition(&mut self, next: WorkerState) {
        trace!(worker_id = self.id, from = ?self.state, to = ?next, "Worker state change");
        self.state = next;
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.state == WorkerState::Terminated {
            return;
        }
        // Unwound outside a task; shutdown waits on the live count
        error!(worker_id = self.id, "Worker thread unwound unexpectedly");
        let shared = Arc::clone(&self.shared);
        let state = shared.state.lock();
        self.exit(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn test_pool(core: usize, max: usize, capacity: usize) -> WorkerPool {
        WorkerPool::new(WorkerPoolConfig::new(
            core,
            max,
            capacity,
            Duration::from_millis(100),
        ))
        .unwrap()
    }

    #[test]
    fn test_core_workers_start_eagerly() {
        let pool = test_pool(3, 5, 10);
        assert_eq!(pool.active_thread_count(), 3);
        assert_eq!(pool.stats().spawned_workers, 3);
        assert_eq!(pool.queue_capacity(), 10);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = WorkerPool::new(WorkerPoolConfig::new(2, 1, 10, Duration::from_secs(1)));
        assert!(matches!(result, Err(WorkerPoolError::Config(_))));
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = test_pool(1, 2, 10);
        let handle = pool.submit(|| "hello".to_string()).unwrap();
        assert_eq!(handle.join(), Ok("hello".to_string()));
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = test_pool(1, 1, 10);

        let failed = pool.submit(|| -> u32 { panic!("task failure") }).unwrap();
        assert_eq!(failed.join(), Err(TaskError::Panicked("task failure".into())));

        let ok = pool.submit(|| 5u32).unwrap();
        assert_eq!(ok.join(), Ok(5));
        assert_eq!(pool.active_thread_count(), 1);
    }

    #[test]
    fn test_value_panicking_on_drop_does_not_kill_worker() {
        struct PanicOnDrop;
        impl Drop for PanicOnDrop {
            fn drop(&mut self) {
                panic!("dropped unread");
            }
        }

        let pool = test_pool(1, 1, 10);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let blocker = pool.submit(move || release_rx.recv().unwrap()).unwrap();

        // Handle dropped while queued, so the value has nowhere to go
        drop(pool.submit(|| PanicOnDrop).unwrap());
        let after = pool.submit(|| 5u32).unwrap();

        release_tx.send(()).unwrap();
        assert_eq!(blocker.join(), Ok(()));
        assert_eq!(after.join(), Ok(5));
        assert_eq!(pool.active_thread_count(), 1);

        pool.shutdown();
        assert_eq!(pool.active_thread_count(), 0);
        let stats = pool.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 2);
    }

    #[test]
    fn test_queue_full_rejects_without_blocking() {
        let pool = test_pool(1, 1, 1);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let blocker = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
            .unwrap();
        started_rx.recv().unwrap();

        let queued = pool.submit(|| 1).unwrap();
        assert_eq!(
            pool.submit(|| 2).unwrap_err(),
            SubmitError::QueueFull { capacity: 1 }
        );
        assert_eq!(pool.stats().rejected, 1);

        release_tx.send(()).unwrap();
        assert_eq!(blocker.join(), Ok(()));
        assert_eq!(queued.join(), Ok(1));
    }
}
