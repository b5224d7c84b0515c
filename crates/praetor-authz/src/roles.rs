//! Role graph resolution and the role validator.
//!
//! Role assignments form a directed graph from subjects to roles, and
//! from roles to the roles they inherit. Resolution walks the graph
//! breadth first with a visited set, so cycles terminate, and stops after
//! a fixed number of hops.

use std::collections::{BTreeSet, HashMap, HashSet};

use praetor_core::{Decision, MatchMode, RoleAssignment};
use tracing::debug;

/// Adjacency view of role assignments.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    edges: HashMap<String, Vec<String>>,
    max_depth: usize,
}

impl RoleGraph {
    /// Builds the graph. Duplicate assignments collapse into one edge.
    pub fn new(assignments: &[RoleAssignment], max_depth: usize) -> Self {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for assignment in assignments {
            let roles = edges.entry(assignment.subject.clone()).or_default();
            if !roles.contains(&assignment.role) {
                roles.push(assignment.role.clone());
            }
        }
        Self { edges, max_depth }
    }

    /// Roles assigned directly to `subject`, in load order.
    pub fn direct_roles(&self, subject: &str) -> &[String] {
        self.edges
            .get(subject)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every role `subject` holds, directly or inherited, sorted.
    ///
    /// The subject itself is not included.
    pub fn resolve(&self, subject: &str) -> BTreeSet<String> {
        let mut roles = BTreeSet::new();
        self.walk(subject, |role| {
            roles.insert(role.to_string());
            false
        });
        roles.remove(subject);
        roles
    }

    /// Whether `subject` is `role` or holds it.
    pub fn has_role(&self, subject: &str, role: &str) -> bool {
        subject == role || self.walk(subject, |r| r == role)
    }

    /// Number of subjects or roles with at least one assignment.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether there are no assignments.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Breadth-first walk; stops early when `visit` returns true.
    fn walk<'a>(&'a self, subject: &'a str, mut visit: impl FnMut(&str) -> bool) -> bool {
        let mut visited: HashSet<&'a str> = HashSet::from([subject]);
        let mut frontier: Vec<&'a str> = vec![subject];

        for _ in 0..self.max_depth {
            let mut next = Vec::new();
            for node in frontier {
                for role in self.direct_roles(node) {
                    if visited.insert(role.as_str()) {
                        if visit(role.as_str()) {
                            return true;
                        }
                        next.push(role.as_str());
                    }
                }
            }
            if next.is_empty() {
                return false;
            }
            frontier = next;
        }

        let truncated = frontier
            .iter()
            .flat_map(|node| self.direct_roles(node))
            .any(|role| !visited.contains(role.as_str()));
        if truncated {
            debug!(
                subject,
                max_depth = self.max_depth,
                "role inheritance deeper than limit ignored"
            );
        }
        false
    }
}

/// A required role list and how to match it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: Vec<String>,
    mode: MatchMode,
}

impl RoleRequirement {
    /// Creates a requirement.
    pub fn new<I, S>(roles: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            mode,
        }
    }

    /// Parses a separator-delimited role list such as `"admin:editor"`.
    ///
    /// Blank entries are dropped. The mode defaults to
    /// [`MatchMode::MatchAll`].
    ///
    /// ```
    /// use praetor_authz::RoleRequirement;
    ///
    /// let req = RoleRequirement::parse("admin: editor", ':');
    /// assert_eq!(req.roles(), ["admin", "editor"]);
    /// ```
    pub fn parse(input: &str, separator: char) -> Self {
        Self::new(
            input
                .split(separator)
                .map(str::trim)
                .filter(|r| !r.is_empty()),
            MatchMode::default(),
        )
    }

    /// Sets the match mode.
    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// The required roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// The match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }
}

/// Checks `subject` against a required role list.
///
/// An empty list always passes, even without a subject. Otherwise an
/// empty subject is [`Decision::Unauthenticated`].
pub fn has_required_roles(
    graph: &RoleGraph,
    subject: &str,
    required: &[String],
    mode: MatchMode,
) -> Decision {
    if required.is_empty() {
        return Decision::Allowed;
    }
    if subject.is_empty() {
        return Decision::Unauthenticated;
    }

    let held = graph.resolve(subject);
    let holds = |role: &String| held.contains(role);
    let ok = match mode {
        MatchMode::MatchAll => required.iter().all(holds),
        MatchMode::AtLeastOne => required.iter().any(holds),
    };
    Decision::from_allowed(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &str)]) -> RoleGraph {
        let assignments: Vec<RoleAssignment> = edges
            .iter()
            .map(|(s, r)| RoleAssignment::new(*s, *r))
            .collect();
        RoleGraph::new(&assignments, 10)
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_transitive_resolution() {
        let g = graph(&[("alice", "editor"), ("editor", "viewer"), ("bob", "viewer")]);
        let resolved: Vec<String> = g.resolve("alice").into_iter().collect();
        assert_eq!(resolved, roles(&["editor", "viewer"]));
        assert!(g.has_role("alice", "viewer"));
        assert!(g.has_role("alice", "alice"));
        assert!(!g.has_role("bob", "editor"));
        assert!(g.resolve("nobody").is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let g = graph(&[("alice", "a"), ("a", "b"), ("b", "a"), ("b", "alice")]);
        let resolved = g.resolve("alice");
        assert_eq!(resolved.len(), 2);
        assert!(!resolved.contains("alice"));
        assert!(!g.has_role("alice", "c"));
    }

    #[test]
    fn test_depth_limit() {
        let chain: Vec<RoleAssignment> = (0..15)
            .map(|i| RoleAssignment::new(format!("r{i}"), format!("r{}", i + 1)))
            .collect();
        let g = RoleGraph::new(&chain, 10);
        assert!(g.has_role("r0", "r10"));
        assert!(!g.has_role("r0", "r11"));
        assert_eq!(g.resolve("r0").len(), 10);
    }

    #[test]
    fn test_duplicate_assignments_collapse() {
        let g = graph(&[("alice", "editor"), ("alice", "editor")]);
        assert_eq!(g.direct_roles("alice"), ["editor"]);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_required_roles_empty_list_passes() {
        let g = RoleGraph::default();
        assert_eq!(
            has_required_roles(&g, "anyone", &[], MatchMode::MatchAll),
            Decision::Allowed
        );
        assert_eq!(
            has_required_roles(&g, "", &[], MatchMode::AtLeastOne),
            Decision::Allowed
        );
    }

    #[test]
    fn test_required_roles_unauthenticated() {
        let g = graph(&[("alice", "admin")]);
        assert_eq!(
            has_required_roles(&g, "", &roles(&["admin"]), MatchMode::MatchAll),
            Decision::Unauthenticated
        );
    }

    #[test]
    fn test_match_modes() {
        let g = graph(&[("alice", "admin"), ("bob", "editor")]);
        let required = roles(&["admin", "editor"]);

        assert_eq!(
            has_required_roles(&g, "alice", &roles(&["admin"]), MatchMode::MatchAll),
            Decision::Allowed
        );
        assert_eq!(
            has_required_roles(&g, "alice", &required, MatchMode::MatchAll),
            Decision::Denied
        );
        assert_eq!(
            has_required_roles(&g, "bob", &required, MatchMode::AtLeastOne),
            Decision::Allowed
        );
        assert_eq!(
            has_required_roles(&g, "carol", &required, MatchMode::AtLeastOne),
            Decision::Denied
        );
    }

    #[test]
    fn test_parse_requirement() {
        let req = RoleRequirement::parse("admin::editor: ", ':').with_mode(MatchMode::AtLeastOne);
        assert_eq!(req.roles(), ["admin", "editor"]);
        assert_eq!(req.mode(), MatchMode::AtLeastOne);
        assert!(RoleRequirement::parse("", ':').roles().is_empty());
    }
}
