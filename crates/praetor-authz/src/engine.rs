//! Enforcement engine.
//!
//! A [`CompiledEnforcer`] is one immutable policy snapshot: a compiled
//! model plus one complete set of rows. It is built off the request path
//! and then shared read-only behind an `Arc`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use praetor_core::{Decision, MatchMode, PolicyRows, PolicyRule};
use praetor_model::{MatchEnv, ModelError, ModelResult, PolicyModel};
use regex::Regex;
use tracing::{debug, warn};

use crate::cache::{CacheStats, DecisionCache};
use crate::config::EnforcerConfig;
use crate::error::AuthzResult;
use crate::roles::{self, RoleGraph};

const MAX_CACHED_PATTERNS: usize = 1024;

/// Selects rules by any combination of subject or role, resource and action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyFilter {
    subject_or_role: Option<String>,
    resource: Option<String>,
    action: Option<String>,
}

impl PolicyFilter {
    /// A filter that matches every rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only rules for this subject or role.
    pub fn subject_or_role(mut self, value: impl Into<String>) -> Self {
        self.subject_or_role = Some(value.into());
        self
    }

    /// Only rules on this resource.
    pub fn resource(mut self, value: impl Into<String>) -> Self {
        self.resource = Some(value.into());
        self
    }

    /// Only rules for this action.
    pub fn action(mut self, value: impl Into<String>) -> Self {
        self.action = Some(value.into());
        self
    }

    /// Whether `rule` passes the filter.
    pub fn matches(&self, rule: &PolicyRule) -> bool {
        let pass = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);
        pass(&self.subject_or_role, &rule.subject_or_role)
            && pass(&self.resource, &rule.resource)
            && pass(&self.action, &rule.action)
    }
}

/// A compiled model together with one loaded row set.
#[derive(Debug)]
pub struct CompiledEnforcer {
    model: PolicyModel,
    rows: PolicyRows,
    /// resource -> action -> rule positions; present when the matcher
    /// requires exact resource and action equality.
    index: Option<HashMap<String, HashMap<String, Vec<usize>>>>,
    roles: RoleGraph,
    cache: DecisionCache,
    patterns: RwLock<HashMap<String, Regex>>,
    generation: u64,
    compiled_at: DateTime<Utc>,
}

impl CompiledEnforcer {
    /// Builds a snapshot.
    ///
    /// Fails if any row has an empty field.
    pub fn compile(
        model: PolicyModel,
        rows: PolicyRows,
        generation: u64,
        config: &EnforcerConfig,
    ) -> ModelResult<Self> {
        for (i, rule) in rows.rules.iter().enumerate() {
            if rule.as_triple().iter().any(|f| f.is_empty()) {
                return Err(ModelError::definition(
                    "p",
                    format!("policy row {} has an empty field", i + 1),
                ));
            }
        }
        for (i, assignment) in rows.assignments.iter().enumerate() {
            if assignment.subject.is_empty() || assignment.role.is_empty() {
                return Err(ModelError::definition(
                    "g",
                    format!("role row {} has an empty field", i + 1),
                ));
            }
        }
        if !rows.assignments.is_empty() && !model.uses_roles() {
            warn!(
                assignments = rows.assignments.len(),
                "model does not use roles; role assignments only affect role checks"
            );
        }

        let index = model.is_indexable().then(|| {
            let mut index: HashMap<String, HashMap<String, Vec<usize>>> = HashMap::new();
            for (i, rule) in rows.rules.iter().enumerate() {
                index
                    .entry(rule.resource.clone())
                    .or_default()
                    .entry(rule.action.clone())
                    .or_default()
                    .push(i);
            }
            index
        });

        let roles = RoleGraph::new(&rows.assignments, config.max_role_depth);

        debug!(
            generation,
            rules = rows.rules.len(),
            assignments = rows.assignments.len(),
            indexed = index.is_some(),
            "compiled enforcer"
        );

        Ok(Self {
            model,
            rows,
            index,
            roles,
            cache: DecisionCache::new(config.cache_config.clone()),
            patterns: RwLock::new(HashMap::new()),
            generation,
            compiled_at: Utc::now(),
        })
    }

    /// Decides whether `subject` may perform `action` on `resource`.
    ///
    /// An empty subject is [`Decision::Unauthenticated`]; an empty
    /// resource or action is [`Decision::Denied`]. Matcher faults are
    /// returned as errors, never as denials.
    pub fn enforce(&self, subject: &str, resource: &str, action: &str) -> AuthzResult<Decision> {
        if subject.is_empty() {
            return Ok(Decision::Unauthenticated);
        }
        if resource.is_empty() || action.is_empty() {
            debug!(subject, resource, action, "no policy defined for request");
            return Ok(Decision::Denied);
        }

        if let Some(decision) = self.cache.get(subject, resource, action) {
            debug!(subject, resource, action, %decision, cached = true, "enforced");
            return Ok(decision);
        }

        let decision = Decision::from_allowed(self.evaluate(subject, resource, action)?);
        self.cache.insert(subject, resource, action, decision);

        debug!(
            subject,
            resource,
            action,
            %decision,
            generation = self.generation,
            "enforced"
        );
        Ok(decision)
    }

    fn evaluate(&self, subject: &str, resource: &str, action: &str) -> AuthzResult<bool> {
        let request = [subject, resource, action];

        if let Some(index) = &self.index {
            let candidates = index
                .get(resource)
                .and_then(|actions| actions.get(action))
                .map(Vec::as_slice)
                .unwrap_or_default();
            for &i in candidates {
                if self.model.matches(&request, &self.rows.rules[i].as_triple(), self)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        for rule in &self.rows.rules {
            if self.model.matches(&request, &rule.as_triple(), self)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every role `subject` holds, directly or inherited, sorted.
    pub fn roles_for(&self, subject: &str) -> Vec<String> {
        self.roles.resolve(subject).into_iter().collect()
    }

    /// Roles assigned directly to `subject`.
    pub fn direct_roles_for(&self, subject: &str) -> &[String] {
        self.roles.direct_roles(subject)
    }

    /// Checks `subject` against a required role list.
    ///
    /// See [`roles::has_required_roles`] for the exact semantics.
    pub fn has_required_roles(
        &self,
        subject: &str,
        required: &[String],
        mode: MatchMode,
    ) -> AuthzResult<Decision> {
        let decision = roles::has_required_roles(&self.roles, subject, required, mode);
        debug!(subject, ?required, ?mode, %decision, "checked required roles");
        Ok(decision)
    }

    /// Rules passing `filter`, in load order.
    pub fn rules_matching(&self, filter: &PolicyFilter) -> Vec<&PolicyRule> {
        self.rows.rules.iter().filter(|r| filter.matches(r)).collect()
    }

    /// Whether the exact rule is loaded.
    pub fn has_rule(&self, subject_or_role: &str, resource: &str, action: &str) -> bool {
        self.rows
            .rules
            .iter()
            .any(|r| r.as_triple() == [subject_or_role, resource, action])
    }

    /// Number of loaded rules.
    pub fn rule_count(&self) -> usize {
        self.rows.rules.len()
    }

    /// Number of loaded role assignments.
    pub fn assignment_count(&self) -> usize {
        self.rows.assignments.len()
    }

    /// The compiled model.
    pub fn model(&self) -> &PolicyModel {
        &self.model
    }

    /// The rows this snapshot was compiled from.
    pub fn rows(&self) -> &PolicyRows {
        &self.rows
    }

    /// Monotonic snapshot number; the first snapshot is 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this snapshot was compiled.
    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    /// Decision cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl MatchEnv for CompiledEnforcer {
    fn has_role(&self, subject: &str, role: &str) -> bool {
        self.roles.has_role(subject, role)
    }

    fn regex_match(&self, value: &str, pattern: &str) -> ModelResult<bool> {
        if let Some(re) = self.patterns.read().get(pattern) {
            return Ok(re.is_match(value));
        }

        let re = Regex::new(pattern)
            .map_err(|e| ModelError::Evaluation(format!("invalid pattern {pattern:?}: {e}")))?;
        let matched = re.is_match(value);

        let mut patterns = self.patterns.write();
        if patterns.len() < MAX_CACHED_PATTERNS {
            patterns.insert(pattern.to_string(), re);
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use praetor_model::DEFAULT_MODEL;

    fn enforcer(rows: PolicyRows) -> CompiledEnforcer {
        CompiledEnforcer::compile(
            PolicyModel::default_rbac().unwrap(),
            rows,
            1,
            &EnforcerConfig::default(),
        )
        .unwrap()
    }

    fn editor_rows() -> PolicyRows {
        PolicyRows::new()
            .with_rule("editor", "document", "update")
            .with_rule("viewer", "document", "list")
            .with_assignment("alice", "editor")
            .with_assignment("editor", "viewer")
    }

    #[test]
    fn test_role_grant() {
        let e = enforcer(editor_rows());
        assert_eq!(e.enforce("alice", "document", "update").unwrap(), Decision::Allowed);
        assert_eq!(e.enforce("alice", "document", "list").unwrap(), Decision::Allowed);
        assert_eq!(e.enforce("alice", "document", "delete").unwrap(), Decision::Denied);
        assert_eq!(e.enforce("bob", "document", "update").unwrap(), Decision::Denied);
    }

    #[test]
    fn test_case_sensitive() {
        let e = enforcer(editor_rows());
        assert_eq!(e.enforce("alice", "Document", "update").unwrap(), Decision::Denied);
    }

    #[test]
    fn test_empty_inputs() {
        let e = enforcer(editor_rows());
        assert_eq!(e.enforce("", "document", "update").unwrap(), Decision::Unauthenticated);
        assert_eq!(e.enforce("alice", "", "update").unwrap(), Decision::Denied);
        assert_eq!(e.enforce("alice", "document", "").unwrap(), Decision::Denied);
    }

    #[test]
    fn test_direct_subject_rule() {
        let e = enforcer(PolicyRows::new().with_rule("bob", "report", "get"));
        assert_eq!(e.enforce("bob", "report", "get").unwrap(), Decision::Allowed);
    }

    #[test]
    fn test_cyclic_roles_grant() {
        let e = enforcer(
            PolicyRows::new()
                .with_rule("b", "ledger", "list")
                .with_assignment("carol", "a")
                .with_assignment("a", "b")
                .with_assignment("b", "a"),
        );
        assert_eq!(e.enforce("carol", "ledger", "list").unwrap(), Decision::Allowed);
        assert_eq!(e.enforce("carol", "ledger", "create").unwrap(), Decision::Denied);
    }

    #[test]
    fn test_empty_row_field_rejected() {
        let err = CompiledEnforcer::compile(
            PolicyModel::default_rbac().unwrap(),
            PolicyRows::new().with_rule("editor", "", "update"),
            1,
            &EnforcerConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("empty field"));
    }

    #[test]
    fn test_unindexed_model_with_key_match() {
        let source = DEFAULT_MODEL.replace("r.obj == p.obj", "keyMatch(r.obj, p.obj)");
        let model = PolicyModel::parse(&source).unwrap();
        let e = CompiledEnforcer::compile(
            model,
            PolicyRows::new()
                .with_rule("admin", "/api/*", "GET")
                .with_assignment("root", "admin"),
            1,
            &EnforcerConfig::default(),
        )
        .unwrap();
        assert_eq!(e.enforce("root", "/api/users", "GET").unwrap(), Decision::Allowed);
        assert_eq!(e.enforce("root", "/web", "GET").unwrap(), Decision::Denied);
    }

    #[test]
    fn test_invalid_regex_is_fault_not_denial() {
        let source = DEFAULT_MODEL.replace("r.obj == p.obj", "regexMatch(r.obj, p.obj)");
        let model = PolicyModel::parse(&source).unwrap();
        let e = CompiledEnforcer::compile(
            model,
            PolicyRows::new().with_rule("admin", "(unclosed", "GET"),
            1,
            &EnforcerConfig::default(),
        )
        .unwrap();
        let err = e.enforce("admin", "/x", "GET").unwrap_err();
        assert!(matches!(err, AuthzError::Evaluation(_)));
    }

    #[test]
    fn test_regex_patterns_cached() {
        let source = DEFAULT_MODEL.replace("r.obj == p.obj", "regexMatch(r.obj, p.obj)");
        let model = PolicyModel::parse(&source).unwrap();
        let e = CompiledEnforcer::compile(
            model,
            PolicyRows::new().with_rule("admin", "^/docs/[0-9]+$", "GET"),
            1,
            &EnforcerConfig::uncached(),
        )
        .unwrap();
        assert!(e.enforce("admin", "/docs/12", "GET").unwrap().is_allowed());
        assert!(e.enforce("admin", "/docs/ab", "GET").unwrap().is_denied());
        assert_eq!(e.patterns.read().len(), 1);
    }

    #[test]
    fn test_cache_used_for_repeat() {
        let e = enforcer(editor_rows());
        e.enforce("alice", "document", "update").unwrap();
        e.enforce("alice", "document", "update").unwrap();
        assert_eq!(e.cache_stats().hits, 1);
    }

    #[test]
    fn test_queries() {
        let e = enforcer(editor_rows());
        assert_eq!(e.roles_for("alice"), vec!["editor", "viewer"]);
        assert_eq!(e.direct_roles_for("alice"), ["editor"]);
        assert!(e.has_rule("editor", "document", "update"));
        assert!(!e.has_rule("alice", "document", "update"));
        assert_eq!(
            e.rules_matching(&PolicyFilter::new().resource("document")).len(),
            2
        );
        assert_eq!(
            e.rules_matching(&PolicyFilter::new().subject_or_role("viewer").action("list")),
            vec![&PolicyRule::new("viewer", "document", "list")]
        );
        assert_eq!(e.rule_count(), 2);
        assert_eq!(e.assignment_count(), 2);
        assert_eq!(e.generation(), 1);
    }

    #[test]
    fn test_has_required_roles() {
        let e = enforcer(editor_rows());
        let viewer = vec!["viewer".to_string()];
        assert_eq!(
            e.has_required_roles("alice", &viewer, MatchMode::MatchAll).unwrap(),
            Decision::Allowed
        );
        assert_eq!(
            e.has_required_roles("bob", &viewer, MatchMode::MatchAll).unwrap(),
            Decision::Denied
        );
    }
}
