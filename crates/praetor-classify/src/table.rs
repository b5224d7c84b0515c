//! Classification tables.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Path parameter names stripped from request paths by default.
pub const DEFAULT_PATH_PARAMS: &[&str] = &["name", "id", "number", "username", "flightID"];

/// Default HTTP method to action mapping.
pub const DEFAULT_METHOD_ACTIONS: &[(&str, &str)] = &[
    ("GET", "list"),
    ("POST", "create"),
    ("PATCH", "update"),
    ("PUT", "update"),
    ("DELETE", "delete"),
];

/// Static lookup tables used to turn a request into `(resource, action)`.
///
/// All lookups are exact. Method names are matched case-insensitively by
/// upper-casing the request method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassificationTable {
    /// Normalized path to resource name.
    pub url_to_resource: HashMap<String, String>,
    /// Normalized path to action override.
    pub url_to_action: HashMap<String, String>,
    /// HTTP method (upper case) to action.
    pub method_to_action: HashMap<String, String>,
    /// Path parameter names whose values are stripped from the path.
    pub path_params: Vec<String>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self {
            url_to_resource: HashMap::new(),
            url_to_action: HashMap::new(),
            method_to_action: DEFAULT_METHOD_ACTIONS
                .iter()
                .map(|(m, a)| ((*m).to_string(), (*a).to_string()))
                .collect(),
            path_params: DEFAULT_PATH_PARAMS.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

impl ClassificationTable {
    /// Creates a table with the default method mapping and parameter names
    /// and no path entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a normalized path to a resource.
    pub fn with_resource(mut self, path: impl Into<String>, resource: impl Into<String>) -> Self {
        self.url_to_resource.insert(path.into(), resource.into());
        self
    }

    /// Overrides the action for a normalized path.
    pub fn with_action(mut self, path: impl Into<String>, action: impl Into<String>) -> Self {
        self.url_to_action.insert(path.into(), action.into());
        self
    }

    /// Maps an HTTP method to an action.
    pub fn with_method(mut self, method: impl Into<String>, action: impl Into<String>) -> Self {
        self.method_to_action
            .insert(method.into().to_ascii_uppercase(), action.into());
        self
    }

    /// Replaces the recognized path parameter names.
    pub fn with_path_params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Resource for a normalized path.
    pub fn resource_for(&self, path: &str) -> Option<&str> {
        self.url_to_resource.get(path).map(String::as_str)
    }

    /// Action for a normalized path and method.
    pub fn action_for(&self, path: &str, method: &str) -> Option<&str> {
        self.url_to_action
            .get(path)
            .or_else(|| self.method_to_action.get(&method.to_ascii_uppercase()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_methods() {
        let table = ClassificationTable::default();
        assert_eq!(table.action_for("/x", "GET"), Some("list"));
        assert_eq!(table.action_for("/x", "post"), Some("create"));
        assert_eq!(table.action_for("/x", "PUT"), Some("update"));
        assert_eq!(table.action_for("/x", "PATCH"), Some("update"));
        assert_eq!(table.action_for("/x", "DELETE"), Some("delete"));
        assert_eq!(table.action_for("/x", "OPTIONS"), None);
        assert_eq!(table.path_params.len(), 5);
    }

    #[test]
    fn test_action_override_wins() {
        let table = ClassificationTable::new().with_action("/api/v1/orders/approve", "approve");
        assert_eq!(table.action_for("/api/v1/orders/approve", "POST"), Some("approve"));
        assert_eq!(table.action_for("/api/v1/orders", "POST"), Some("create"));
    }

    #[test]
    fn test_deserialize_partial_table() {
        let table: ClassificationTable = serde_json::from_str(
            r#"{"url_to_resource": {"/documents": "document"}}"#,
        )
        .unwrap();
        assert_eq!(table.resource_for("/documents"), Some("document"));
        assert_eq!(table.action_for("/documents", "GET"), Some("list"));
    }
}
