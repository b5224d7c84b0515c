//! Request classification.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::table::ClassificationTable;

/// The `(resource, action)` pair a request maps to.
///
/// Either half may be empty when no mapping exists; an empty half must
/// be treated as "no policy defined" and denied downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Classification {
    /// Logical resource name.
    pub resource: String,
    /// Logical action name.
    pub action: String,
    /// The path after parameter stripping.
    pub normalized_path: String,
}

impl Classification {
    /// Whether both resource and action were resolved.
    pub fn is_complete(&self) -> bool {
        !self.resource.is_empty() && !self.action.is_empty()
    }
}

/// Maps raw request paths and methods to `(resource, action)` pairs.
///
/// The table is immutable after construction and shared cheaply.
#[derive(Debug, Clone, Default)]
pub struct RequestClassifier {
    table: Arc<ClassificationTable>,
}

impl RequestClassifier {
    /// Creates a classifier over a table.
    pub fn new(table: ClassificationTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// The underlying table.
    pub fn table(&self) -> &ClassificationTable {
        &self.table
    }

    /// Classifies a request. Never fails.
    pub fn classify(
        &self,
        path: &str,
        path_params: &HashMap<String, String>,
        method: &str,
    ) -> Classification {
        let normalized_path = self.normalize_path(path, path_params);
        let resource = self
            .table
            .resource_for(&normalized_path)
            .unwrap_or_default()
            .to_string();
        let action = self
            .table
            .action_for(&normalized_path, method)
            .unwrap_or_default()
            .to_string();

        trace!(path, normalized = %normalized_path, resource, action, "classified request");

        Classification {
            resource,
            action,
            normalized_path,
        }
    }

    /// Strips recognized parameter values from `path`.
    pub fn normalize_path(&self, path: &str, path_params: &HashMap<String, String>) -> String {
        let values: Vec<&str> = self
            .table
            .path_params
            .iter()
            .filter_map(|name| path_params.get(name))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .collect();
        strip_segments(path, &values)
    }
}

/// Removes every path segment equal to one of `values`.
///
/// Matching is per whole segment, so a value never cuts into a longer
/// segment. A static segment spelled like the value is removed too:
/// `/api/v1/users/users` with value `users` becomes `/api/v1`. Removing
/// only one occurrence would leave the value in the path, and a second
/// pass would strip again. A trailing slash is kept. The result is never
/// empty.
pub fn strip_segments(path: &str, values: &[&str]) -> String {
    if values.is_empty() {
        return path.to_string();
    }

    let trailing = path.len() > 1 && path.ends_with('/');
    let body = path.strip_suffix('/').unwrap_or(path);

    let kept: Vec<&str> = body
        .split('/')
        .filter(|segment| segment.is_empty() || !values.contains(segment))
        .collect();

    let mut out = kept.join("/");
    if trailing || (out.is_empty() && path.starts_with('/')) {
        out.push('/');
    }
    out
}
