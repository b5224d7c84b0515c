//! Prometheus metrics for Praetor.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `praetor_decisions_total` | Counter | `outcome` | Final authorization outcomes |
//! | `praetor_fallback_grants_total` | Counter | `rule` | Grants made by a fallback rule |
//! | `praetor_reloads_total` | Counter | `result` | Reload attempts |
//! | `praetor_enforce_duration_seconds` | Histogram | - | Time spent in one authorization |
//! | `praetor_policy_generation` | Gauge | - | Generation of the active policy snapshot |
//!
//! Recording functions are no-ops until a recorder is installed.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Final outcomes counter.
pub const DECISIONS_TOTAL: &str = "praetor_decisions_total";
/// Fallback grants counter.
pub const FALLBACK_GRANTS_TOTAL: &str = "praetor_fallback_grants_total";
/// Reload attempts counter.
pub const RELOADS_TOTAL: &str = "praetor_reloads_total";
/// Authorization latency histogram.
pub const ENFORCE_DURATION_SECONDS: &str = "praetor_enforce_duration_seconds";
/// Active snapshot generation gauge.
pub const POLICY_GENERATION: &str = "praetor_policy_generation";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Buckets for `praetor_enforce_duration_seconds`.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 10us .. 100ms; enforcement is in-memory
            duration_buckets: vec![
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
            ],
        }
    }
}

/// Installs the Prometheus recorder and registers metric descriptions.
///
/// Calling this more than once fails because only one global recorder can
/// be installed.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] if the recorder cannot be built
/// or installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(ENFORCE_DURATION_SECONDS.to_string()),
            &config.duration_buckets,
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(DECISIONS_TOTAL, "Final authorization outcomes by result");
    describe_counter!(
        FALLBACK_GRANTS_TOTAL,
        "Requests granted by a fallback rule after a primary denial"
    );
    describe_counter!(RELOADS_TOTAL, "Policy reload attempts by result");
    describe_histogram!(
        ENFORCE_DURATION_SECONDS,
        "Time spent authorizing one request in seconds"
    );
    describe_gauge!(POLICY_GENERATION, "Generation of the active policy snapshot");
}

/// Records a final authorization outcome.
///
/// `outcome` is one of `allowed`, `denied`, `unauthenticated` or `error`.
pub fn record_decision(outcome: &'static str, duration: Duration) {
    counter!(DECISIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(ENFORCE_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Records a grant made by a fallback rule.
pub fn record_fallback_grant(rule: &str) {
    counter!(FALLBACK_GRANTS_TOTAL, "rule" => rule.to_string()).increment(1);
}

/// Records a reload attempt. On success, also publishes the new generation.
pub fn record_reload(success: bool, generation: u64) {
    let result = if success { "success" } else { "failure" };
    counter!(RELOADS_TOTAL, "result" => result).increment(1);
    if success {
        gauge!(POLICY_GENERATION).set(generation as f64);
    }
}
