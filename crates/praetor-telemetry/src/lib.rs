//! Observability for Praetor.
//!
//! - **Logging**: structured JSON or pretty logs via `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! # Example
//!
//! ```rust,ignore
//! use praetor_telemetry::{init_telemetry, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::default())?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use self::metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Logging and metrics configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns the first subsystem error.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
