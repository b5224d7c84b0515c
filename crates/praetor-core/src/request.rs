//! Request facts consumed by an authorization check.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The facts about one inbound request that authorization needs.
///
/// The subject is produced by an upstream token verifier; an empty subject
/// means the request is unauthenticated.
///
/// # Example
///
/// ```
/// use praetor_core::AccessRequest;
///
/// let request = AccessRequest::new("alice", "PATCH", "/documents/42")
///     .with_path_param("id", "42")
///     .with_query_param("draft", "true");
///
/// assert_eq!(request.path_params.get("id").map(String::as_str), Some("42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Authenticated subject identifier (empty = unauthenticated).
    pub subject: String,
    /// HTTP method as received (e.g. `GET`).
    pub method: String,
    /// Raw request path.
    pub path: String,
    /// Named path parameters extracted by the router.
    #[serde(default)]
    pub path_params: HashMap<String, String>,
    /// Query string parameters.
    #[serde(default)]
    pub query_params: HashMap<String, String>,
}

impl AccessRequest {
    /// Creates a request with no parameters.
    pub fn new(
        subject: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            method: method.into(),
            path: path.into(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
        }
    }

    /// Adds a named path parameter.
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter.
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    /// Returns true if no subject is present.
    pub fn is_unauthenticated(&self) -> bool {
        self.subject.is_empty()
    }
}
