//! Store traits and the in-memory store.

use std::future::Future;

use parking_lot::RwLock;
use praetor_core::{PolicyRows, PolicyRule, RoleAssignment};
use tracing::debug;

use crate::error::StoreResult;

/// A source of policy rows.
///
/// A load always returns one complete, self-consistent row set.
pub trait PolicyStore: Send + Sync {
    /// Reads every rule and role assignment.
    fn load(&self) -> impl Future<Output = StoreResult<PolicyRows>> + Send;
}

/// An administrative change to a writable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyChange {
    /// Replace every rule of `subject_or_role` on `resource` with one rule
    /// per action.
    ReplaceRules {
        /// Subject or role whose rules change.
        subject_or_role: String,
        /// Resource the rules apply to.
        resource: String,
        /// New action set (may be empty, which revokes all).
        actions: Vec<String>,
    },
    /// Add a role assignment (no-op if present).
    AssignRole(RoleAssignment),
    /// Remove a role assignment (no-op if absent).
    RevokeRole(RoleAssignment),
}

impl PolicyChange {
    /// Applies the change to an in-memory row set.
    pub fn apply_to(&self, rows: &mut PolicyRows) {
        match self {
            Self::ReplaceRules {
                subject_or_role,
                resource,
                actions,
            } => {
                rows.rules.retain(|r| {
                    !(r.subject_or_role == *subject_or_role && r.resource == *resource)
                });
                for action in actions {
                    let rule = PolicyRule::new(subject_or_role, resource, action);
                    if !rows.rules.contains(&rule) {
                        rows.rules.push(rule);
                    }
                }
            }
            Self::AssignRole(assignment) => {
                if !rows.assignments.contains(assignment) {
                    rows.assignments.push(assignment.clone());
                }
            }
            Self::RevokeRole(assignment) => {
                rows.assignments.retain(|a| a != assignment);
            }
        }
    }
}

/// A store that accepts administrative changes.
pub trait MutablePolicyStore: PolicyStore {
    /// Persists a change. The change is visible to the next [`PolicyStore::load`].
    fn apply(&self, change: PolicyChange) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Store holding rows in memory.
///
/// Useful for tests and for embedding rows compiled into a binary.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    rows: RwLock<PolicyRows>,
}

impl MemoryPolicyStore {
    /// Creates a store seeded with rows.
    pub fn new(rows: PolicyRows) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Replaces all rows at once.
    pub fn replace(&self, rows: PolicyRows) {
        *self.rows.write() = rows;
    }

    /// Returns a copy of the current rows.
    pub fn rows(&self) -> PolicyRows {
        self.rows.read().clone()
    }
}

impl PolicyStore for MemoryPolicyStore {
    fn load(&self) -> impl Future<Output = StoreResult<PolicyRows>> + Send {
        let rows = self.rows();
        debug!(
            rules = rows.rules.len(),
            assignments = rows.assignments.len(),
            "loaded rows from memory store"
        );
        std::future::ready(Ok(rows))
    }
}

impl MutablePolicyStore for MemoryPolicyStore {
    fn apply(&self, change: PolicyChange) -> impl Future<Output = StoreResult<()>> + Send {
        change.apply_to(&mut self.rows.write());
        std::future::ready(Ok(()))
    }
}
