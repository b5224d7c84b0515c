//! Error types for model parsing and matcher evaluation.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while compiling or evaluating a policy model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModelError {
    /// A required section is absent.
    #[error("missing section [{0}]")]
    MissingSection(String),

    /// A line could not be understood.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number in the model source.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A definition has the wrong shape.
    #[error("invalid definition {key}: {message}")]
    Definition {
        /// Definition key (`r`, `p`, `g`, `e`).
        key: String,
        /// What went wrong.
        message: String,
    },

    /// The matcher expression does not parse.
    #[error("matcher error at offset {offset}: {message}")]
    Matcher {
        /// Byte offset in the matcher expression.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// Matcher evaluation failed at request time.
    #[error("matcher evaluation failed: {0}")]
    Evaluation(String),
}

impl ModelError {
    /// Create a syntax error.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Create a definition error.
    pub fn definition(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a matcher error.
    pub fn matcher(offset: usize, message: impl Into<String>) -> Self {
        Self::Matcher {
            offset,
            message: message.into(),
        }
    }

    /// Check if this error happened at evaluation time rather than compile time.
    pub const fn is_evaluation(&self) -> bool {
        matches!(self, Self::Evaluation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::MissingSection("matchers".to_string());
        assert_eq!(err.to_string(), "missing section [matchers]");

        let err = ModelError::syntax(3, "expected '='");
        assert_eq!(err.to_string(), "line 3: expected '='");
    }

    #[test]
    fn test_is_evaluation() {
        assert!(ModelError::Evaluation("bad regex".to_string()).is_evaluation());
        assert!(!ModelError::matcher(0, "unexpected end").is_evaluation());
    }
}
