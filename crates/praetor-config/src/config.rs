//! Main configuration type.
//!
//! This module provides the top-level [`PraetorConfig`] struct.

use std::fs;

use praetor_authz::EnforcerConfig;
use praetor_classify::ClassificationTable;
use serde::{Deserialize, Serialize};

use crate::{
    AdminSection, CacheSection, ConfigError, EnforcerSection, FallbackSection, LogFormat,
    ModelSection, StoreKind, StoreSection, TelemetrySection,
};

/// Complete Praetor configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use praetor_config::{PraetorConfig, StoreKind};
///
/// let config = PraetorConfig::default();
/// assert_eq!(config.store.kind, StoreKind::Memory);
/// assert_eq!(config.enforcer.max_role_depth, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PraetorConfig {
    /// Policy model.
    #[serde(default)]
    pub model: ModelSection,

    /// Policy store.
    #[serde(default)]
    pub store: StoreSection,

    /// Enforcement engine.
    #[serde(default)]
    pub enforcer: EnforcerSection,

    /// Decision cache.
    #[serde(default)]
    pub cache: CacheSection,

    /// Request classification tables.
    #[serde(default)]
    pub classification: ClassificationTable,

    /// Fallback rules.
    #[serde(default)]
    pub fallback: FallbackSection,

    /// Policy administration.
    #[serde(default)]
    pub admin: AdminSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl PraetorConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if:
    /// - Both `model.path` and `model.text` are set
    /// - The file store has no path, or watching is enabled for another store
    /// - `enforcer.max_role_depth` is zero
    /// - The admin action list is empty or contains a blank action
    /// - A fallback rule has a blank name or override
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.path.is_some() && self.model.text.is_some() {
            return Err(ConfigError::invalid_value(
                "model",
                "set either model.path or model.text, not both",
            ));
        }

        if self.store.kind == StoreKind::File && self.store.path.is_none() {
            return Err(ConfigError::missing_field("store.path"));
        }
        if self.store.watch && self.store.kind != StoreKind::File {
            return Err(ConfigError::invalid_value(
                "store.watch",
                "watching requires the file store",
            ));
        }

        if self.enforcer.max_role_depth == 0 {
            return Err(ConfigError::invalid_value(
                "enforcer.max_role_depth",
                "must be at least 1",
            ));
        }

        if self.admin.actions.is_empty() {
            return Err(ConfigError::invalid_value(
                "admin.actions",
                "at least one action is required",
            ));
        }
        if self.admin.actions.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "admin.actions",
                "actions must not be blank",
            ));
        }

        for (i, rule) in self.fallback.rules.iter().enumerate() {
            if rule.name.trim().is_empty()
                || rule.override_resource.trim().is_empty()
                || rule.override_action.trim().is_empty()
            {
                return Err(ConfigError::invalid_value(
                    format!("fallback.rules[{i}]"),
                    "name, override_resource and override_action must not be blank",
                ));
            }
        }

        Ok(())
    }

    /// Development preset: pretty debug logs, no metrics recorder.
    ///
    /// ```
    /// use praetor_config::{LogFormat, PraetorConfig};
    ///
    /// let config = PraetorConfig::development();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    /// assert!(!config.telemetry.metrics.enabled);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.metrics.enabled = false;
        config
    }

    /// Production preset: JSON info logs, metrics enabled.
    #[must_use]
    pub fn production() -> Self {
        Self::default()
    }

    /// Engine configuration from the `enforcer` and `cache` sections.
    pub fn enforcer_config(&self) -> EnforcerConfig {
        EnforcerConfig::new()
            .with_max_role_depth(self.enforcer.max_role_depth)
            .with_cache_config(self.cache.to_cache_config())
    }

    /// The model text to compile.
    ///
    /// Reads `model.path` if set, otherwise returns `model.text`, otherwise
    /// the built-in RBAC model.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the model file cannot be read.
    pub fn model_source(&self) -> Result<String, ConfigError> {
        if let Some(path) = &self.model.path {
            return fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e));
        }
        Ok(self
            .model
            .text
            .clone()
            .unwrap_or_else(|| praetor_model::DEFAULT_MODEL.to_string()))
    }
}
