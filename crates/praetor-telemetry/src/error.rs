//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing logging or metrics.
///
/// Both subsystems install process-wide globals, so a second
/// initialization in the same process also ends up here.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder could not be built or installed.
    #[error("metrics setup failed: {0}")]
    MetricsInit(String),

    /// The filter is invalid or a subscriber is already set.
    #[error("logging setup failed: {0}")]
    LoggingInit(String),
}
