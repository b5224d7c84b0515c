//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::{ConfigError, LogFormat, PraetorConfig, StoreKind};

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones:
/// 1. Default values (built into the code)
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use praetor_config::ConfigLoader;
///
/// # fn main() -> Result<(), praetor_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_file("praetor.toml")?
///     .with_env_prefix("PRAETOR")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: PraetorConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PraetorConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use praetor_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PraetorConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = PraetorConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats. The file replaces
    /// the current layer; sections it omits take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        debug!(path = %path.display(), "configuration file loaded");

        Ok(self)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use praetor_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [enforcer]
    ///     max_role_depth = 4
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.enforcer.max_role_depth, 4);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "PRAETOR":
    /// - `PRAETOR__STORE__PATH=/etc/praetor/policy.csv`
    /// - `PRAETOR__CACHE__ENABLED=false`
    /// - `PRAETOR__TELEMETRY__LOGGING__LEVEL=debug`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        self
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation
    /// fails.
    pub fn load(self) -> Result<PraetorConfig, ConfigError> {
        let vars: BTreeMap<String, String> = match &self.env_prefix {
            Some(prefix) => env::vars().filter(|(k, _)| k.starts_with(prefix)).collect(),
            None => BTreeMap::new(),
        };
        self.load_with_vars(vars)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> PraetorConfig {
        self.config
    }

    fn load_with_vars(
        mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<PraetorConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    // Parse configuration file based on extension
    fn parse_file(content: &str, path: &Path) -> Result<PraetorConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    // Apply a single environment variable
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__"))
        else {
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            // Model section
            ["MODEL", "PATH"] => config.model.path = optional_path(value),
            ["MODEL", "TEXT"] => config.model.text = optional_string(value),

            // Store section
            ["STORE", "KIND"] => {
                config.store.kind = match value.to_lowercase().as_str() {
                    "memory" => StoreKind::Memory,
                    "file" => StoreKind::File,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'memory' or 'file'")),
                };
            }
            ["STORE", "PATH"] => config.store.path = optional_path(value),
            ["STORE", "WATCH"] => config.store.watch = parse_bool(key, value)?,
            ["STORE", "DEBOUNCE_MS"] => config.store.debounce_ms = parse_number(key, value)?,

            // Enforcer section
            ["ENFORCER", "MAX_ROLE_DEPTH"] => {
                config.enforcer.max_role_depth = parse_number(key, value)?;
            }

            // Cache section
            ["CACHE", "ENABLED"] => config.cache.enabled = parse_bool(key, value)?,
            ["CACHE", "MAX_ENTRIES"] => config.cache.max_entries = parse_number(key, value)?,
            ["CACHE", "TTL_SECS"] => config.cache.ttl_secs = parse_number(key, value)?,
            ["CACHE", "CACHE_DENIES"] => config.cache.cache_denies = parse_bool(key, value)?,

            // Classification section
            ["CLASSIFICATION", "PATH_PARAMS"] => {
                config.classification.path_params = parse_list(value);
            }

            // Fallback section
            ["FALLBACK", "USE_DEFAULTS"] => {
                config.fallback.use_defaults = parse_bool(key, value)?;
            }

            // Admin section
            ["ADMIN", "ACTIONS"] => config.admin.actions = parse_list(value),

            // Telemetry logging
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                config.telemetry.logging.enabled = parse_bool(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                config.telemetry.logging.include_location = parse_bool(key, value)?;
            }

            // Telemetry metrics
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                config.telemetry.metrics.enabled = parse_bool(key, value)?;
            }

            _ => debug!(key, "ignoring unknown configuration variable"),
        }

        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn optional_string(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}
