//! Delayed task scheduler
//!
//! Every scheduled task gets its own lightweight timer task: it sleeps for the
//! delay, runs the callable on the blocking pool, and stores the outcome under
//! the task's id. There is no shared scheduling queue, so a cancellation only
//! ever races with the one timer it targets.
//!
//! Cancellation is compare-and-cancel. The timer claims its id under the
//! registry lock before running the callable and stores the outcome only if
//! the id is still registered, so a cancelled task never runs when cancelled
//! during its delay and never has a late result re-appear.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::{SchedulerError, TaskId};
use crate::config::SchedulerConfig;
use crate::handle::{self, Completer, ResultHandle, TaskError};

enum TimerPhase {
    /// Sleeping out the delay; can still be aborted
    Waiting,
    /// Callable handed to the blocking pool
    Running,
}

struct PendingTask {
    phase: TimerPhase,
    abort: Option<AbortHandle>,
}

struct Registry<R> {
    next_id: TaskId,
    pending: HashMap<TaskId, PendingTask>,
    results: HashMap<TaskId, ResultHandle<R>>,
    stopped: bool,
}

/// Runs callables once after a delay
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskpool::scheduler::DelayedTaskScheduler;
/// use taskpool::SchedulerConfig;
///
/// let scheduler = DelayedTaskScheduler::new(SchedulerConfig::default())?;
///
/// let id = scheduler.schedule_task(Duration::from_millis(20), || 40 + 2)?;
/// assert!(scheduler.is_task_pending(id));
/// assert_eq!(scheduler.task_result(id)?, 42);
/// assert!(!scheduler.is_task_pending(id));
/// # Ok::<(), taskpool::scheduler::SchedulerError>(())
/// ```
pub struct DelayedTaskScheduler<R> {
    registry: Arc<Mutex<Registry<R>>>,
    runtime: Option<Runtime>,
    handle: Handle,
}

impl<R: Send + 'static> DelayedTaskScheduler<R> {
    /// Create a scheduler that owns its timer runtime
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.timer_threads.max(1))
            .thread_name(config.thread_name.clone())
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(Some(runtime), handle))
    }

    /// Create a scheduler whose timers run on an existing tokio runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self::build(None, handle)
    }

    fn build(runtime: Option<Runtime>, handle: Handle) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                pending: HashMap::new(),
                results: HashMap::new(),
                stopped: false,
            })),
            runtime,
            handle,
        }
    }

    /// Run `task` once after `delay`; returns immediately with the task's id
    pub fn schedule_task<F>(&self, delay: Duration, task: F) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let mut registry = self.registry.lock();
        if registry.stopped {
            return Err(SchedulerError::Stopped);
        }

        let id = registry.next_id;
        registry.next_id += 1;

        let (completer, result) = handle::channel();
        // The timer blocks on the registry lock until this entry is inserted
        let timer = self.handle.spawn(run_timer(
            Arc::clone(&self.registry),
            id,
            delay,
            task,
            completer,
        ));

        registry.pending.insert(
            id,
            PendingTask {
                phase: TimerPhase::Waiting,
                abort: Some(timer.abort_handle()),
            },
        );
        registry.results.insert(id, result);

        debug!(task_id = id, delay_ms = delay.as_millis() as u64, "Scheduled delayed task");
        Ok(id)
    }

    /// Millisecond variant of [`schedule_task`](Self::schedule_task); negative delays are rejected
    pub fn schedule_task_millis<F>(&self, delay_ms: i64, task: F) -> Result<TaskId, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let millis = u64::try_from(delay_ms).map_err(|_| {
            SchedulerError::InvalidArgument(format!("delay must be non-negative, got {delay_ms}ms"))
        })?;
        self.schedule_task(Duration::from_millis(millis), task)
    }

    /// Block until the task's outcome is available, then remove and return it
    ///
    /// The read is destructive: a second call for the same id fails with
    /// [`SchedulerError::NotFound`], as does a call for an unknown or
    /// cancelled id.
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context; use
    /// [`task_result_async`](Self::task_result_async) there.
    pub fn task_result(&self, id: TaskId) -> Result<R, SchedulerError> {
        let result = self.take_result(id)?;
        result.join().map_err(|err| outcome_error(id, err))
    }

    /// Awaitable variant of [`task_result`](Self::task_result)
    pub async fn task_result_async(&self, id: TaskId) -> Result<R, SchedulerError> {
        let result = self.take_result(id)?;
        result.await.map_err(|err| outcome_error(id, err))
    }

    fn take_result(&self, id: TaskId) -> Result<ResultHandle<R>, SchedulerError> {
        self.registry
            .lock()
            .results
            .remove(&id)
            .ok_or(SchedulerError::NotFound(id))
    }
}

impl<R> DelayedTaskScheduler<R> {
    /// True until the task's callable has completed (or it was cancelled)
    pub fn is_task_pending(&self, id: TaskId) -> bool {
        self.registry.lock().pending.contains_key(&id)
    }

    /// Number of tasks whose callable has not completed yet
    pub fn pending_count(&self) -> usize {
        self.registry.lock().pending.len()
    }

    /// Forget a task: abort its timer if it has not fired, drop any unread outcome
    ///
    /// Returns false only when the id is unknown or both already completed and
    /// read. A callable that already started keeps running, but its outcome is
    /// discarded.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        let mut registry = self.registry.lock();
        let had_result = registry.results.remove(&id).is_some();

        let was_pending = match registry.pending.remove(&id) {
            Some(task) => {
                if let Some(abort) = task.abort {
                    abort.abort();
                }
                if matches!(task.phase, TimerPhase::Running) {
                    debug!(task_id = id, "Cancelled task is already running, outcome will be dropped");
                }
                true
            }
            None => false,
        };

        let cancelled = had_result || was_pending;
        if cancelled {
            debug!(task_id = id, was_pending, "Cancelled delayed task");
        }
        cancelled
    }

    /// Cancel every pending timer and refuse further scheduling
    ///
    /// Outcomes that already completed stay readable.
    pub fn shutdown(&self) {
        let mut registry = self.registry.lock();
        if registry.stopped {
            return;
        }
        registry.stopped = true;

        let cancelled = registry.pending.len();
        for (_, task) in registry.pending.drain() {
            if let Some(abort) = task.abort {
                abort.abort();
            }
        }
        info!(cancelled, "Delayed task scheduler shut down");
    }
}

impl<R> Drop for DelayedTaskScheduler<R> {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn run_timer<R, F>(
    registry: Arc<Mutex<Registry<R>>>,
    id: TaskId,
    delay: Duration,
    task: F,
    completer: Completer<R>,
) where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    tokio::time::sleep(delay).await;

    {
        let mut guard = registry.lock();
        match guard.pending.get_mut(&id) {
            Some(pending) => {
                pending.phase = TimerPhase::Running;
                pending.abort = None;
            }
            None => {
                debug!(task_id = id, "Timer fired after cancellation, skipping");
                return;
            }
        }
    }

    debug!(task_id = id, "Delayed task fired");
    tokio::task::spawn_blocking(move || {
        let outcome = handle::run_catching(task);
        if let Err(err) = &outcome {
            warn!(task_id = id, error = %err, "Delayed task panicked");
        }

        // Store and clear the pending flag in one critical section
        let mut guard = registry.lock();
        if guard.pending.remove(&id).is_some() {
            if let Err(err) = completer.deliver(outcome) {
                warn!(task_id = id, error = %err, "Delayed task outcome panicked on drop");
            }
        } else {
            debug!(task_id = id, "Task cancelled while running, dropping outcome");
        }
    });
}

fn outcome_error(id: TaskId, err: TaskError) -> SchedulerError {
    match err {
        TaskError::Discarded => SchedulerError::NotFound(id),
        other => SchedulerError::Task(other),
    }
}
