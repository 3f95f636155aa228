//! Pool and scheduler configuration
//!
//! Both configs follow the same conventions: serde-friendly (durations as
//! milliseconds), `with_*` builders, and `from_env()` for process-level
//! configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field violates a pool invariant
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Worker pool configuration
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskpool::WorkerPoolConfig;
///
/// let config = WorkerPoolConfig::new(2, 8, 256, Duration::from_secs(30))
///     .with_thread_name("ingest-worker");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Workers started eagerly and never retired on idle
    pub core_threads: usize,

    /// Hard cap on concurrently live workers
    pub max_threads: usize,

    /// Maximum number of queued (not yet dispatched) tasks
    pub queue_capacity: usize,

    /// How long a non-core worker waits for work before retiring
    #[serde(with = "duration_millis")]
    pub idle_timeout: Duration,

    /// Prefix for worker thread names
    pub thread_name: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_threads: 4,
            max_threads: 8,
            queue_capacity: 1024,
            idle_timeout: Duration::from_secs(60),
            thread_name: "taskpool-worker".to_string(),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration from the four sizing parameters
    pub fn new(
        core_threads: usize,
        max_threads: usize,
        queue_capacity: usize,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            core_threads,
            max_threads,
            queue_capacity,
            idle_timeout,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `TASKPOOL_CORE_THREADS`: core worker count (default: 4)
    /// - `TASKPOOL_MAX_THREADS`: maximum worker count (default: 8)
    /// - `TASKPOOL_QUEUE_CAPACITY`: queue capacity (default: 1024)
    /// - `TASKPOOL_IDLE_TIMEOUT_MS`: idle timeout in milliseconds (default: 60000)
    /// - `TASKPOOL_THREAD_NAME`: worker thread name prefix
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            core_threads: env_parse("TASKPOOL_CORE_THREADS").unwrap_or(defaults.core_threads),
            max_threads: env_parse("TASKPOOL_MAX_THREADS").unwrap_or(defaults.max_threads),
            queue_capacity: env_parse("TASKPOOL_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity),
            idle_timeout: env_parse("TASKPOOL_IDLE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_timeout),
            thread_name: std::env::var("TASKPOOL_THREAD_NAME").unwrap_or(defaults.thread_name),
        }
    }

    /// Set the core thread count
    pub fn with_core_threads(mut self, core: usize) -> Self {
        self.core_threads = core;
        self
    }

    /// Set the maximum thread count
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the idle timeout for non-core workers
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the worker thread name prefix
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_threads == 0 {
            return Err(ConfigError::Invalid(
                "core_threads must be greater than 0".into(),
            ));
        }
        if self.max_threads < self.core_threads {
            return Err(ConfigError::Invalid(
                "max_threads cannot be less than core_threads".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the runtime a [`DelayedTaskScheduler`] owns
///
/// [`DelayedTaskScheduler`]: crate::scheduler::DelayedTaskScheduler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Async worker threads driving the timers
    pub timer_threads: usize,

    /// Prefix for timer thread names
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timer_threads: 1,
            thread_name: "taskpool-timer".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Create a new scheduler configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// - `TASKPOOL_TIMER_THREADS`: timer runtime worker threads (default: 1)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timer_threads: env_parse("TASKPOOL_TIMER_THREADS").unwrap_or(defaults.timer_threads),
            ..defaults
        }
    }

    /// Set the number of timer threads (at least one)
    pub fn with_timer_threads(mut self, threads: usize) -> Self {
        self.timer_threads = threads.max(1);
        self
    }

    /// Set the timer thread name prefix
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Serde support for Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
