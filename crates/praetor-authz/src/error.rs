//! Error types for the authorization crate.

use http::StatusCode;
use praetor_model::ModelError;
use praetor_store::StoreError;
use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Faults raised while authorizing or managing policy.
///
/// A plain denial or a missing subject is never an error; those are
/// [`praetor_core::Decision`] values.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// Evaluating the matcher failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    /// A reload was rejected; the previous enforcer stays active.
    #[error("policy reload failed: {0}")]
    Reload(String),

    /// The startup policy could not be compiled.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The policy store failed outside of a reload.
    #[error("policy store error: {0}")]
    Store(#[from] StoreError),

    /// An administrative change is malformed.
    #[error("invalid policy change: {0}")]
    InvalidInput(String),

    /// An administrative change named an action outside the vocabulary.
    #[error("invalid action {action:?}, expected one of {allowed:?}")]
    InvalidAction {
        /// The rejected action.
        action: String,
        /// The accepted vocabulary.
        allowed: Vec<String>,
    },
}

/// Coarse fault classification for callers mapping errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Evaluation or store read failed while serving a request.
    EvaluationFault,
    /// A reload was rejected and the old policy retained.
    ReloadFault,
    /// The policy is unusable at startup.
    ConfigurationFault,
    /// The caller supplied an invalid administrative change.
    InvalidInput,
}

impl AuthzError {
    /// Create a reload error from any displayable cause.
    pub fn reload(cause: impl std::fmt::Display) -> Self {
        Self::Reload(cause.to_string())
    }

    /// Create a configuration error from any displayable cause.
    pub fn configuration(cause: impl std::fmt::Display) -> Self {
        Self::Configuration(cause.to_string())
    }

    /// Create an invalid action error.
    pub fn invalid_action(action: impl Into<String>, allowed: &[String]) -> Self {
        Self::InvalidAction {
            action: action.into(),
            allowed: allowed.to_vec(),
        }
    }

    /// Classifies this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Evaluation(_) | Self::Store(_) => ErrorKind::EvaluationFault,
            Self::Reload(_) => ErrorKind::ReloadFault,
            Self::Configuration(_) => ErrorKind::ConfigurationFault,
            Self::InvalidInput(_) | Self::InvalidAction { .. } => ErrorKind::InvalidInput,
        }
    }

    /// Check if this is a reload error.
    pub const fn is_reload(&self) -> bool {
        matches!(self, Self::Reload(_))
    }

    /// Check if a later retry may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Reload(_) => true,
            _ => false,
        }
    }

    /// HTTP status the transport layer should answer with.
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message safe to return to callers.
    ///
    /// Never includes rule contents or model details.
    pub const fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => "bad request",
            _ => "internal error",
        }
    }
}

impl From<ModelError> for AuthzError {
    fn from(err: ModelError) -> Self {
        Self::Evaluation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            AuthzError::Evaluation("bad regex".into()).kind(),
            ErrorKind::EvaluationFault
        );
        assert_eq!(AuthzError::reload("syntax").kind(), ErrorKind::ReloadFault);
        assert_eq!(
            AuthzError::configuration("no model").kind(),
            ErrorKind::ConfigurationFault
        );
        assert_eq!(
            AuthzError::Store(StoreError::Unavailable("down".into())).kind(),
            ErrorKind::EvaluationFault
        );
    }

    #[test]
    fn test_public_message_does_not_leak() {
        let err = AuthzError::Evaluation("invalid pattern \"(admin\"".into());
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("(admin"));
    }

    #[test]
    fn test_invalid_action() {
        let allowed = vec!["create".to_string(), "list".to_string()];
        let err = AuthzError::invalid_action("approve", &allowed);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "bad request");
        assert!(err.to_string().contains("approve"));
    }

    #[test]
    fn test_retryable() {
        assert!(AuthzError::reload("x").is_retryable());
        assert!(AuthzError::Store(StoreError::Unavailable("down".into())).is_retryable());
        assert!(!AuthzError::Evaluation("x".into()).is_retryable());
    }

    #[test]
    fn test_from_model_error() {
        let err: AuthzError = ModelError::Evaluation("invalid pattern".into()).into();
        assert!(matches!(err, AuthzError::Evaluation(_)));
    }
}
