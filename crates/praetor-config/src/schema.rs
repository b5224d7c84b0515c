//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use praetor_authz::{
    CacheConfig, FallbackChain, FallbackRule, DEFAULT_ACTIONS, DEFAULT_MAX_ROLE_DEPTH,
};
use praetor_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Policy model section.
///
/// At most one of `path` and `text` may be set. With neither, the built-in
/// RBAC model is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    /// Path to a model file.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Inline model text.
    #[serde(default)]
    pub text: Option<String>,
}

/// Where policy rows are stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// In-process rows, empty at startup.
    #[default]
    Memory,
    /// A policy file on disk.
    File,
}

/// Policy store section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// Store backend.
    #[serde(default)]
    pub kind: StoreKind,

    /// Policy file path (required for `file`).
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Reload automatically when the policy file changes.
    #[serde(default)]
    pub watch: bool,

    /// Debounce window for file change events, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: None,
            watch: false,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl StoreSection {
    /// Debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    500
}

/// Enforcer section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnforcerSection {
    /// Maximum role inheritance depth.
    #[serde(default = "default_max_role_depth")]
    pub max_role_depth: usize,
}

impl Default for EnforcerSection {
    fn default() -> Self {
        Self {
            max_role_depth: default_max_role_depth(),
        }
    }
}

fn default_max_role_depth() -> usize {
    DEFAULT_MAX_ROLE_DEPTH
}

/// Decision cache section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Enable the per-snapshot decision cache.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum cached decisions per snapshot.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Cache denials as well as grants.
    #[serde(default)]
    pub cache_denies: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
            cache_denies: false,
        }
    }
}

impl CacheSection {
    /// Converts to the engine's cache configuration.
    pub fn to_cache_config(&self) -> CacheConfig {
        if !self.enabled {
            return CacheConfig::disabled();
        }
        CacheConfig {
            max_entries: self.max_entries,
            ttl: Duration::from_secs(self.ttl_secs),
            cache_denies: self.cache_denies,
        }
    }
}

fn default_max_entries() -> usize {
    10_000
}

fn default_ttl_secs() -> u64 {
    300
}

/// A `(resource, action)` pair a fallback rule applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FallbackTarget {
    /// Classified resource.
    pub resource: String,
    /// Classified action.
    pub action: String,
}

/// A declarative fallback rule.
///
/// ```toml
/// [[fallback.rules]]
/// name = "reports-for-auditors"
/// override_resource = "audit"
/// override_action = "list"
/// targets = [{ resource = "report", action = "list" }]
/// query = { scope = "audit" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FallbackRuleConfig {
    /// Rule name for logs and metrics.
    pub name: String,

    /// Resource checked instead.
    pub override_resource: String,

    /// Action checked instead.
    pub override_action: String,

    /// Requests the rule applies to. Empty means every request.
    #[serde(default)]
    pub targets: Vec<FallbackTarget>,

    /// Required query parameter values.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl FallbackRuleConfig {
    /// Builds the runtime rule.
    pub fn to_rule(&self) -> FallbackRule {
        let rule = FallbackRule::new(
            self.name.as_str(),
            self.override_resource.as_str(),
            self.override_action.as_str(),
        );
        let rule = self
            .targets
            .iter()
            .fold(rule, |rule, t| rule.on(t.resource.as_str(), t.action.as_str()));
        self.query
            .iter()
            .fold(rule, |rule, (k, v)| rule.with_query(k.as_str(), v.as_str()))
    }
}

/// Fallback rules section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FallbackSection {
    /// Start from the built-in lookup exceptions.
    #[serde(default = "default_true")]
    pub use_defaults: bool,

    /// Additional rules, evaluated after the built-in ones.
    #[serde(default)]
    pub rules: Vec<FallbackRuleConfig>,
}

impl Default for FallbackSection {
    fn default() -> Self {
        Self {
            use_defaults: true,
            rules: Vec::new(),
        }
    }
}

impl FallbackSection {
    /// Builds the runtime chain.
    pub fn to_chain(&self) -> FallbackChain {
        let mut chain = if self.use_defaults {
            FallbackChain::with_defaults()
        } else {
            FallbackChain::default()
        };
        for rule in &self.rules {
            chain.push(rule.to_rule());
        }
        chain
    }
}

/// Policy administration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AdminSection {
    /// Actions accepted by role permission updates.
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            actions: default_actions(),
        }
    }
}

fn default_actions() -> Vec<String> {
    DEFAULT_ACTIONS.iter().map(|a| (*a).to_string()).collect()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. "info" or "praetor_authz=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,

    /// Log span open and close events.
    #[serde(default)]
    pub span_events: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
            span_events: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Install the Prometheus recorder.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Histogram buckets for enforcement latency, in seconds.
    #[serde(default)]
    pub duration_buckets: Option<Vec<f64>>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: None,
        }
    }
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl TelemetrySection {
    /// Converts to the telemetry crate's configuration.
    pub fn to_telemetry_config(&self) -> TelemetryConfig {
        let logging = LogConfig {
            enabled: self.logging.enabled,
            filter: self.logging.level.clone(),
            json: self.logging.format == LogFormat::Json,
            span_events: self.logging.span_events,
            include_location: self.logging.include_location,
        };
        let defaults = MetricsConfig::default();
        let metrics = MetricsConfig {
            enabled: self.metrics.enabled,
            duration_buckets: self
                .metrics
                .duration_buckets
                .clone()
                .unwrap_or(defaults.duration_buckets),
        };
        TelemetryConfig { logging, metrics }
    }
}
