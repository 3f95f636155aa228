//! Periodic task actuation
//!
//! Runs a [`TimerTask`] every `interval` on a dedicated background thread that
//! drives a single-threaded tokio timer, until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::SchedulerError;
use crate::handle;

/// Work executed on every tick
pub trait TimerTask: Send + Sync + 'static {
    fn execute(&self);
}

impl<F> TimerTask for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn execute(&self) {
        self()
    }
}

struct ActiveLoop {
    stop_tx: watch::Sender<bool>,
    thread: JoinHandle<()>,
}

/// Executes a task at a fixed interval
///
/// The first execution happens one interval after [`start`](Self::start).
/// A panicking execution is logged and the schedule continues.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use taskpool::scheduler::PeriodicActuator;
///
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&ticks);
///
/// let actuator = PeriodicActuator::new(
///     Arc::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
///     Duration::from_millis(10),
/// )?;
///
/// actuator.start()?;
/// std::thread::sleep(Duration::from_millis(50));
/// actuator.stop();
///
/// assert!(ticks.load(Ordering::SeqCst) >= 1);
/// # Ok::<(), taskpool::scheduler::SchedulerError>(())
/// ```
pub struct PeriodicActuator {
    task: Arc<dyn TimerTask>,
    interval: Duration,
    running: Arc<AtomicBool>,
    active: Mutex<Option<ActiveLoop>>,
}

impl PeriodicActuator {
    /// Create a stopped actuator; the interval must be positive
    pub fn new(task: Arc<dyn TimerTask>, interval: Duration) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidArgument(
                "interval must be positive".into(),
            ));
        }

        Ok(Self {
            task,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(None),
        })
    }

    /// Start ticking in the background
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut active = self.active.lock();
        if active.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = Arc::clone(&self.task);
        let interval = self.interval;
        let running = Arc::clone(&self.running);

        self.running.store(true, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("taskpool-periodic".to_string())
            .spawn(move || {
                runtime.block_on(tick_loop(task, interval, stop_rx));
                running.store(false, Ordering::SeqCst);
            });

        match spawned {
            Ok(thread) => {
                info!(interval_ms = interval.as_millis() as u64, "Periodic actuator started");
                *active = Some(ActiveLoop { stop_tx, thread });
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    /// Stop ticking and wait for the background thread to finish
    ///
    /// An execution in progress completes first. No-op when not running.
    /// Called from the task itself, it only signals the loop, which exits once
    /// the current execution returns.
    pub fn stop(&self) {
        let Some(ActiveLoop { stop_tx, thread }) = self.active.lock().take() else {
            return;
        };

        let _ = stop_tx.send(true);
        if thread.thread().id() == std::thread::current().id() {
            debug!("Periodic actuator stopped from its own task, not joining");
            return;
        }
        if thread.join().is_err() {
            error!("Periodic actuator thread panicked");
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Periodic actuator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for PeriodicActuator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn tick_loop(
    task: Arc<dyn TimerTask>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = handle::run_catching(|| task.execute()) {
                    warn!(error = %err, "Periodic task panicked, schedule continues");
                }
            }
            _ = stop_rx.changed() => {
                debug!("Periodic actuator: stop requested");
                break;
            }
        }
    }
}
