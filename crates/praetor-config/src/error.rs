//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling a [`PraetorConfig`](crate::PraetorConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration file does not exist.
    #[error("no configuration at {}", path.display())]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A configuration or model file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    ReadError {
        /// Path that was read.
        path: PathBuf,
        /// IO failure.
        #[source]
        source: std::io::Error,
    },

    /// TOML document does not match the schema.
    #[error("invalid TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON document does not match the schema.
    #[error("invalid JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format {0:?} (expected toml or json)")]
    UnsupportedFormat(String),

    /// A value parsed but breaks a cross-field rule.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending setting.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A setting required by another setting is absent.
    #[error("{field} is required")]
    MissingField {
        /// Dotted path of the missing setting.
        field: String,
    },

    /// An environment override could not be parsed.
    #[error("environment override {var}: {reason}")]
    EnvParseError {
        /// Variable name, including the prefix.
        var: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Missing configuration file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unreadable file.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Rejected value.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Absent setting.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Unparseable environment override.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// The dotted setting path this error is about, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } | Self::MissingField { field } => Some(field),
            _ => None,
        }
    }

    /// Whether the document itself could not be decoded.
    pub const fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::TomlError(_) | Self::JsonError(_) | Self::UnsupportedFormat(_)
        )
    }
}
