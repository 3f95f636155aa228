//! Single-shot result handles
//!
//! A [`ResultHandle`] is the consumer half of a oneshot channel. Exactly one
//! producer (a pool worker or a scheduler timer) fills it exactly once with
//! either the task's value or its captured failure.
//!
//! Reads are destructive: every way of reading a handle consumes it, so a
//! second read of the same outcome cannot be expressed. [`ResultHandle::try_join`]
//! hands the handle back when the outcome is not ready yet.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

/// Failure of a task body, surfaced at result retrieval
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task panicked while running
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was dropped before it ran (immediate shutdown or cancellation)
    #[error("task was discarded before it ran")]
    Discarded,
}

/// Consumer half of a task's outcome
///
/// Await it from async code, or call [`join`](Self::join) from a plain thread.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskpool::{WorkerPool, WorkerPoolConfig};
///
/// let pool = WorkerPool::new(WorkerPoolConfig::new(1, 1, 8, Duration::from_secs(1)))?;
/// let handle = pool.submit(|| 6 * 7)?;
/// assert_eq!(handle.join(), Ok(42));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
#[must_use = "a result handle does nothing unless it is joined or awaited"]
pub struct ResultHandle<R> {
    rx: oneshot::Receiver<Result<R, TaskError>>,
}

impl<R> ResultHandle<R> {
    /// Block the current thread until the outcome is available
    ///
    /// # Panics
    ///
    /// Panics when called from within an async execution context; await the
    /// handle there instead.
    pub fn join(self) -> Result<R, TaskError> {
        self.rx.blocking_recv().unwrap_or(Err(TaskError::Discarded))
    }

    /// Take the outcome if it is ready, otherwise give the handle back
    pub fn try_join(mut self) -> Result<Result<R, TaskError>, Self> {
        match self.rx.try_recv() {
            Ok(outcome) => Ok(outcome),
            Err(TryRecvError::Empty) => Err(self),
            Err(TryRecvError::Closed) => Ok(Err(TaskError::Discarded)),
        }
    }
}

impl<R> Future for ResultHandle<R> {
    type Output = Result<R, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TaskError::Discarded)))
    }
}

/// Producer half of a task's outcome
///
/// Dropping a completer without completing it resolves the handle with
/// [`TaskError::Discarded`].
#[derive(Debug)]
pub(crate) struct Completer<R> {
    tx: oneshot::Sender<Result<R, TaskError>>,
}

impl<R> Completer<R> {
    /// Deliver the outcome; returns false if the handle was already dropped
    pub(crate) fn complete(self, outcome: Result<R, TaskError>) -> bool {
        self.tx.send(outcome).is_ok()
    }

    /// [`complete`](Self::complete), with a panic raised while dropping an
    /// undeliverable value captured instead of unwinding into the caller
    pub(crate) fn deliver(self, outcome: Result<R, TaskError>) -> Result<bool, TaskError> {
        run_catching(move || self.complete(outcome))
    }
}

/// Create a connected completer/handle pair
pub(crate) fn channel<R>() -> (Completer<R>, ResultHandle<R>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, ResultHandle { rx })
}

/// Run a task body, converting a panic into [`TaskError::Panicked`]
pub(crate) fn run_catching<F, R>(task: F) -> Result<R, TaskError>
where
    F: FnOnce() -> R,
{
    panic::catch_unwind(AssertUnwindSafe(task))
        .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_value_is_joined() {
        let (completer, handle) = channel();
        assert!(completer.complete(Ok(7)));
        assert_eq!(handle.join(), Ok(7));
    }

    #[test]
    fn test_dropped_completer_discards() {
        let (completer, handle) = channel::<u32>();
        drop(completer);
        assert_eq!(handle.join(), Err(TaskError::Discarded));
    }

    #[test]
    fn test_complete_after_handle_dropped() {
        let (completer, handle) = channel();
        drop(handle);
        assert!(!completer.complete(Ok("late")));
    }

    #[test]
    fn test_deliver_contains_panicking_drop_of_unread_value() {
        struct PanicOnDrop;
        impl Drop for PanicOnDrop {
            fn drop(&mut self) {
                panic!("value dropped");
            }
        }

        let (completer, handle) = channel();
        drop(handle);
        assert_eq!(
            completer.deliver(Ok(PanicOnDrop)),
            Err(TaskError::Panicked("value dropped".into()))
        );
    }

    #[test]
    fn test_try_join_returns_handle_until_ready() {
        let (completer, handle) = channel();

        let handle = match handle.try_join() {
            Err(handle) => handle,
            Ok(outcome) => panic!("outcome should not be ready: {:?}", outcome),
        };

        completer.complete(Ok("done"));
        assert_eq!(handle.try_join().ok(), Some(Ok("done")));
    }

    #[test]
    fn test_run_catching_captures_panics() {
        assert_eq!(run_catching(|| 1 + 1), Ok(2));

        let static_msg = run_catching(|| -> u8 { panic!("boom") });
        assert_eq!(static_msg, Err(TaskError::Panicked("boom".into())));

        let formatted = run_catching(|| -> u8 { panic!("code {}", 3) });
        assert_eq!(formatted, Err(TaskError::Panicked("code 3".into())));
    }

    #[tokio::test]
    async fn test_handle_is_awaitable() {
        let (completer, handle) = channel();
        tokio::spawn(async move {
            completer.complete(Ok(String::from("async")));
        });
        assert_eq!(handle.await, Ok("async".to_string()));
    }
}
