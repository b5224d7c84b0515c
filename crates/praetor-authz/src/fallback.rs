//! Fallback rules.
//!
//! A fallback rule grants a denied request when the subject holds a
//! different, related permission. Rules are plain data: a trigger over
//! the classified request and an override `(resource, action)` to check
//! instead. They are consulted only after a primary denial.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use praetor_core::Decision;
use tracing::debug;

use crate::engine::CompiledEnforcer;
use crate::error::AuthzResult;

/// Anything that can answer an enforce query.
pub trait Enforce {
    /// Decides whether `subject` may perform `action` on `resource`.
    fn enforce(&self, subject: &str, resource: &str, action: &str) -> AuthzResult<Decision>;
}

impl Enforce for CompiledEnforcer {
    fn enforce(&self, subject: &str, resource: &str, action: &str) -> AuthzResult<Decision> {
        Self::enforce(self, subject, resource, action)
    }
}

/// The classified request a trigger is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct FallbackContext<'a> {
    /// Classified resource.
    pub resource: &'a str,
    /// Classified action.
    pub action: &'a str,
    /// Query string parameters.
    pub query_params: &'a HashMap<String, String>,
}

type Predicate = Arc<dyn Fn(&FallbackContext<'_>) -> bool + Send + Sync>;

/// When a fallback rule applies.
#[derive(Clone)]
pub enum FallbackTrigger {
    /// Matches listed `(resource, action)` targets (any, if none are
    /// listed) when every required query parameter has the given value.
    Declarative {
        /// Accepted `(resource, action)` pairs.
        targets: Vec<(String, String)>,
        /// Required query parameter values.
        query: Vec<(String, String)>,
    },
    /// Arbitrary predicate.
    Custom(Predicate),
}

impl FallbackTrigger {
    /// Evaluates the trigger.
    pub fn matches(&self, ctx: &FallbackContext<'_>) -> bool {
        match self {
            Self::Declarative { targets, query } => {
                let target_ok = targets.is_empty()
                    || targets
                        .iter()
                        .any(|(r, a)| r == ctx.resource && a == ctx.action);
                target_ok
                    && query
                        .iter()
                        .all(|(k, v)| ctx.query_params.get(k) == Some(v))
            }
            Self::Custom(predicate) => predicate(ctx),
        }
    }
}

impl fmt::Debug for FallbackTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declarative { targets, query } => f
                .debug_struct("Declarative")
                .field("targets", targets)
                .field("query", query)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One entry of the fallback table.
#[derive(Debug, Clone)]
pub struct FallbackRule {
    name: String,
    trigger: FallbackTrigger,
    override_resource: String,
    override_action: String,
}

impl FallbackRule {
    /// Starts a declarative rule. Add targets with [`Self::on`] and query
    /// conditions with [`Self::with_query`].
    pub fn new(
        name: impl Into<String>,
        override_resource: impl Into<String>,
        override_action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            trigger: FallbackTrigger::Declarative {
                targets: Vec::new(),
                query: Vec::new(),
            },
            override_resource: override_resource.into(),
            override_action: override_action.into(),
        }
    }

    /// A rule driven by an arbitrary predicate.
    pub fn custom<F>(
        name: impl Into<String>,
        predicate: F,
        override_resource: impl Into<String>,
        override_action: impl Into<String>,
    ) -> Self
    where
        F: Fn(&FallbackContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            trigger: FallbackTrigger::Custom(Arc::new(predicate)),
            override_resource: override_resource.into(),
            override_action: override_action.into(),
        }
    }

    /// Adds a `(resource, action)` target. No effect on custom rules.
    pub fn on(mut self, resource: impl Into<String>, action: impl Into<String>) -> Self {
        if let FallbackTrigger::Declarative { targets, .. } = &mut self.trigger {
            targets.push((resource.into(), action.into()));
        }
        self
    }

    /// Requires a query parameter value. No effect on custom rules.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let FallbackTrigger::Declarative { query, .. } = &mut self.trigger {
            query.push((key.into(), value.into()));
        }
        self
    }

    /// Rule name, used in logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trigger.
    pub fn trigger(&self) -> &FallbackTrigger {
        &self.trigger
    }

    /// Resource checked when the trigger matches.
    pub fn override_resource(&self) -> &str {
        &self.override_resource
    }

    /// Action checked when the trigger matches.
    pub fn override_action(&self) -> &str {
        &self.override_action
    }
}

/// Ordered fallback table.
#[derive(Debug, Clone, Default)]
pub struct FallbackChain {
    rules: Vec<FallbackRule>,
}

impl FallbackChain {
    /// Creates a chain from rules in evaluation order.
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    /// A chain with the built-in lookup exceptions.
    ///
    /// 1. `branch-sorting`: listing branches with `isSorting=true` is
    ///    allowed to holders of `(branchSorting, list)`.
    /// 2. `register-box-lookups`: listing vendors, branches, box types or
    ///    box sizes is allowed to holders of `(registerBox, create)`.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            FallbackRule::new("branch-sorting", "branchSorting", "list")
                .on("branch", "list")
                .with_query("isSorting", "true"),
            FallbackRule::new("register-box-lookups", "registerBox", "create")
                .on("vendor", "list")
                .on("branch", "list")
                .on("boxType", "list")
                .on("boxSize", "list"),
        ])
    }

    /// Appends a rule.
    pub fn push(&mut self, rule: FallbackRule) {
        self.rules.push(rule);
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[FallbackRule] {
        &self.rules
    }

    /// Whether the chain has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Tries each matching rule in order and returns the first that grants.
    ///
    /// A matching rule whose override check denies does not stop the scan.
    /// Faults from the override check are returned immediately.
    pub fn evaluate<E: Enforce + ?Sized>(
        &self,
        enforcer: &E,
        subject: &str,
        ctx: &FallbackContext<'_>,
    ) -> AuthzResult<Option<&FallbackRule>> {
        for rule in &self.rules {
            if !rule.trigger.matches(ctx) {
                continue;
            }
            let decision =
                enforcer.enforce(subject, &rule.override_resource, &rule.override_action)?;
            debug!(
                rule = %rule.name,
                subject,
                resource = ctx.resource,
                action = ctx.action,
                %decision,
                "fallback rule checked"
            );
            if decision.is_allowed() {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::error::AuthzError;

    /// Grants a fixed set of triples and records every query.
    struct FakeEnforcer {
        grants: Vec<(&'static str, &'static str, &'static str)>,
        calls: RefCell<Vec<(String, String)>>,
        fail: bool,
    }

    impl FakeEnforcer {
        fn new(grants: Vec<(&'static str, &'static str, &'static str)>) -> Self {
            Self {
                grants,
                calls: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl Enforce for FakeEnforcer {
        fn enforce(&self, subject: &str, resource: &str, action: &str) -> AuthzResult<Decision> {
            self.calls
                .borrow_mut()
                .push((resource.to_string(), action.to_string()));
            if self.fail {
                return Err(AuthzError::Evaluation("boom".to_string()));
            }
            Ok(Decision::from_allowed(
                self.grants
                    .iter()
                    .any(|g| *g == (subject, resource, action)),
            ))
        }
    }

    fn ctx<'a>(
        resource: &'a str,
        action: &'a str,
        query: &'a HashMap<String, String>,
    ) -> FallbackContext<'a> {
        FallbackContext {
            resource,
            action,
            query_params: query,
        }
    }

    #[test]
    fn test_branch_sorting_requires_query() {
        let chain = FallbackChain::with_defaults();
        let e = FakeEnforcer::new(vec![("sam", "branchSorting", "list")]);

        let sorting = HashMap::from([("isSorting".to_string(), "true".to_string())]);
        let granted = chain.evaluate(&e, "sam", &ctx("branch", "list", &sorting)).unwrap();
        assert_eq!(granted.map(FallbackRule::name), Some("branch-sorting"));

        let none = HashMap::new();
        let granted = chain.evaluate(&e, "sam", &ctx("branch", "list", &none)).unwrap();
        assert!(granted.is_none());
    }

    #[test]
    fn test_matched_denial_continues_scan() {
        let chain = FallbackChain::with_defaults();
        let e = FakeEnforcer::new(vec![("clerk", "registerBox", "create")]);

        let sorting = HashMap::from([("isSorting".to_string(), "true".to_string())]);
        let granted = chain
            .evaluate(&e, "clerk", &ctx("branch", "list", &sorting))
            .unwrap();
        assert_eq!(granted.map(FallbackRule::name), Some("register-box-lookups"));
        assert_eq!(e.calls.borrow().len(), 2);
    }

    #[test]
    fn test_first_grant_short_circuits() {
        let chain = FallbackChain::new(vec![
            FallbackRule::new("first", "a", "x").on("r", "list"),
            FallbackRule::new("second", "b", "y").on("r", "list"),
        ]);
        let e = FakeEnforcer::new(vec![("s", "a", "x"), ("s", "b", "y")]);
        let query = HashMap::new();

        let granted = chain.evaluate(&e, "s", &ctx("r", "list", &query)).unwrap();
        assert_eq!(granted.map(FallbackRule::name), Some("first"));
        assert_eq!(*e.calls.borrow(), vec![("a".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_unmatched_trigger_not_enforced() {
        let chain = FallbackChain::with_defaults();
        let e = FakeEnforcer::new(vec![("clerk", "registerBox", "create")]);
        let query = HashMap::new();

        let granted = chain
            .evaluate(&e, "clerk", &ctx("document", "delete", &query))
            .unwrap();
        assert!(granted.is_none());
        assert!(e.calls.borrow().is_empty());
    }

    #[test]
    fn test_fault_propagates() {
        let chain = FallbackChain::with_defaults();
        let mut e = FakeEnforcer::new(vec![]);
        e.fail = true;
        let query = HashMap::new();

        let err = chain
            .evaluate(&e, "clerk", &ctx("vendor", "list", &query))
            .unwrap_err();
        assert!(matches!(err, AuthzError::Evaluation(_)));
    }

    #[test]
    fn test_custom_rule() {
        let chain = FallbackChain::new(vec![FallbackRule::custom(
            "reports-by-prefix",
            |c: &FallbackContext<'_>| c.resource.starts_with("report") && c.action == "get",
            "reporting",
            "read",
        )]);
        let e = FakeEnforcer::new(vec![("ana", "reporting", "read")]);
        let query = HashMap::new();

        let granted = chain
            .evaluate(&e, "ana", &ctx("reportDaily", "get", &query))
            .unwrap();
        assert!(granted.is_some());
        assert!(format!("{:?}", chain.rules()[0].trigger()).contains("Custom"));
    }
}
