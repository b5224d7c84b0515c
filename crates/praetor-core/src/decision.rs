//! Authorization outcomes.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Routine outcome of an authorization check.
///
/// Faults are never expressed as a `Decision`; they travel as errors so a
/// denial can always be told apart from a failed evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The subject may proceed.
    Allowed,
    /// No policy grants the request.
    Denied,
    /// No subject was supplied.
    Unauthenticated,
}

impl Decision {
    /// Creates a decision from a boolean match result.
    pub const fn from_allowed(allowed: bool) -> Self {
        if allowed {
            Self::Allowed
        } else {
            Self::Denied
        }
    }

    /// Returns true for [`Decision::Allowed`].
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Returns true for [`Decision::Denied`].
    pub const fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }

    /// Returns a short label for logs and metrics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    /// HTTP status the transport layer should answer with.
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Allowed => StatusCode::OK,
            Self::Denied => StatusCode::FORBIDDEN,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    /// Generic message safe to return to callers.
    ///
    /// Never includes rule contents.
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::Allowed => "ok",
            Self::Denied => "forbidden",
            Self::Unauthenticated => "unauthorized",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a required role list is matched against a subject's roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every required role must be held.
    #[default]
    MatchAll,
    /// At least one required role must be held.
    AtLeastOne,
}
