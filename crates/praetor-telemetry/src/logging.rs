//! Structured logging.
//!
//! Decisions are logged at `debug`, reloads at `info`, rejected reloads at
//! `warn` and evaluation faults at `warn` or above, so `info` is a sensible
//! production filter and `praetor_authz=debug` traces individual decisions.
//!
//! # Example
//!
//! ```rust,ignore
//! use praetor_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(generation = 3, "policy reloaded");
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether to install a subscriber at all.
    pub enabled: bool,

    /// `EnvFilter` directive, e.g. `info` or `praetor_authz=debug,info`.
    pub filter: String,

    /// JSON lines when true, multi-line pretty output otherwise.
    pub json: bool,

    /// Emit span open and close events (reload and authorize spans).
    pub span_events: bool,

    /// Include source file and line.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: "info".to_string(),
            json: true,
            span_events: false,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Pretty output at debug level with spans and locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            filter: "debug".to_string(),
            json: false,
            span_events: true,
            include_location: true,
            ..Self::default()
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInit`] if the filter does not parse or
/// a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.filter)?;
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location);
    let fmt_layer = if config.json {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.pretty().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Parses a filter directive.
///
/// # Errors
///
/// Returns [`TelemetryError::LoggingInit`] naming the bad directive.
pub fn create_env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| {
        TelemetryError::LoggingInit(format!("invalid log filter {directive:?}: {e}"))
    })
}
