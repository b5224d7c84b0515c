//! Policy and role-assignment rows.
//!
//! Rows are flat string tuples produced by a policy store. They are immutable
//! once loaded; a reload replaces the whole set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Returns why `value` can not be used as a rule or assignment field.
///
/// Fields must survive the line-oriented policy file format unchanged:
/// non-empty, no surrounding whitespace, no `,` separator, no `#`
/// comment marker and no control characters (which covers line breaks).
///
/// ```
/// use praetor_core::field_violation;
///
/// assert_eq!(field_violation("document"), None);
/// assert!(field_violation("report, list\ng, mallory, admin").is_some());
/// ```
pub fn field_violation(value: &str) -> Option<&'static str> {
    if value.is_empty() {
        Some("must not be empty")
    } else if value.trim() != value {
        Some("must not start or end with whitespace")
    } else if value.contains(',') {
        Some("must not contain ','")
    } else if value.contains('#') {
        Some("must not contain '#'")
    } else if value.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    }
}

/// A single grant: `subject_or_role` may perform `action` on `resource`.
///
/// Duplicate rules are harmless; matching is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Subject identifier or role name the grant applies to.
    pub subject_or_role: String,
    /// Logical resource name (e.g. `document`).
    pub resource: String,
    /// Action name (e.g. `update`).
    pub action: String,
}

impl PolicyRule {
    /// Creates a new policy rule.
    pub fn new(
        subject_or_role: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            subject_or_role: subject_or_role.into(),
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Returns the rule as a `[subject, resource, action]` triple.
    pub fn as_triple(&self) -> [&str; 3] {
        [&self.subject_or_role, &self.resource, &self.action]
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p, {}, {}, {}", self.subject_or_role, self.resource, self.action)
    }
}

/// Membership edge: `subject` holds `role`.
///
/// Roles can themselves be subjects of an assignment, which forms a role
/// hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Subject (or role) receiving the role.
    pub subject: String,
    /// Role being granted.
    pub role: String,
}

impl RoleAssignment {
    /// Creates a new role assignment.
    pub fn new(subject: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g, {}, {}", self.subject, self.role)
    }
}

/// One complete read of a policy store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRows {
    /// Policy rules.
    pub rules: Vec<PolicyRule>,
    /// Role assignments.
    pub assignments: Vec<RoleAssignment>,
}

impl PolicyRows {
    /// Creates an empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a policy rule.
    pub fn with_rule(
        mut self,
        subject_or_role: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        self.rules
            .push(PolicyRule::new(subject_or_role, resource, action));
        self
    }

    /// Adds a role assignment.
    pub fn with_assignment(mut self, subject: impl Into<String>, role: impl Into<String>) -> Self {
        self.assignments.push(RoleAssignment::new(subject, role));
        self
    }

    /// Returns true if there are no rules and no assignments.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.assignments.is_empty()
    }
}
