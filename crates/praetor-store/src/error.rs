//! Store error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by policy stores.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing source could not be read or written.
    #[error("policy store unavailable: {0}")]
    Unavailable(String),

    /// A policy file line is malformed.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The store does not support the requested change.
    #[error("unsupported policy change: {0}")]
    Unsupported(String),

    /// Watcher setup failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Create a parse error.
    pub fn parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Check if retrying the operation may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = StoreError::parse("policy.csv", 4, "expected 3 fields");
        assert_eq!(err.to_string(), "policy.csv:4: expected 3 fields");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(StoreError::Unavailable("db down".to_string()).is_retryable());
        assert!(!StoreError::Watch("inotify".to_string()).is_retryable());
    }
}
