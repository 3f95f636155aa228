// Tracing setup
//
// The library only emits `tracing` events; installing a subscriber is left to
// the embedding application. `init_tracing` is a convenience for binaries,
// benches and tests that want console output with an env-driven filter.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter applied when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration for console logging
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "debug", "taskpool=trace")
    pub log_filter: Option<String>,
    /// Include the event target (module path) in each line
    pub with_target: bool,
    /// Include the emitting thread's name; worker threads are named `{thread_name}-{id}`
    pub with_thread_names: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            with_target: true,
            with_thread_names: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            ..Self::default()
        }
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Resolve the configured filter, falling back to [`DEFAULT_LOG_FILTER`]
    /// when it is missing or does not parse
    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Install a global console subscriber
///
/// Fails if a global subscriber is already set, which callers can usually
/// ignore.
///
/// # Example
///
/// ```
/// use taskpool::telemetry::{init_tracing, TelemetryConfig};
///
/// let _ = init_tracing(TelemetryConfig::from_env());
/// tracing::info!("pool starting");
/// ```
pub fn init_tracing(config: TelemetryConfig) -> Result<(), TryInitError> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_thread_names(config.with_thread_names)
        .with_filter(config.env_filter());

    tracing_subscriber::registry().with(console_layer).try_init()
}
