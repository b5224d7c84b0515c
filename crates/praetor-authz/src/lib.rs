//! Praetor Authorization - Policy Enforcement and Live Reload
//!
//! This crate turns a parsed policy model and a set of policy rows into
//! allow/deny decisions for inbound requests.
//!
//! # Overview
//!
//! - [`CompiledEnforcer`] is one immutable snapshot of model, rules and
//!   role graph. It answers `(subject, resource, action)` queries.
//! - [`EnforcerHandle`] owns the active snapshot and swaps it atomically
//!   on reload. A rejected reload keeps the previous snapshot.
//! - [`FallbackChain`] grants some denied requests when the subject holds
//!   a related permission.
//! - [`PolicyAdmin`] edits a writable store and reloads.
//! - [`Authorizer`] ties classification, enforcement and fallback
//!   together for one request.
//!
//! # Architecture
//!
//! ```text
//!     AccessRequest
//!          │
//!     ┌────▼──────────────┐
//!     │ RequestClassifier │  path + method -> (resource, action)
//!     └────┬──────────────┘
//!          │
//!     ┌────▼──────────────┐      ┌────────────────┐
//!     │ CompiledEnforcer  │◄─────│ EnforcerHandle │◄── reload
//!     └────┬──────────────┘      └────────────────┘
//!          │ denied
//!     ┌────▼──────────────┐
//!     │ FallbackChain     │
//!     └────┬──────────────┘
//!          ▼
//!   AuthorizationOutcome
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use praetor_authz::{Authorizer, EnforcerConfig, EnforcerHandle, FallbackChain};
//! use praetor_classify::{ClassificationTable, RequestClassifier};
//! use praetor_core::{AccessRequest, Decision, PolicyRows};
//! use praetor_model::DEFAULT_MODEL;
//!
//! let rows = PolicyRows::new()
//!     .with_rule("editor", "document", "update")
//!     .with_assignment("alice", "editor");
//! let handle = EnforcerHandle::new(DEFAULT_MODEL, rows, EnforcerConfig::default()).unwrap();
//! let classifier = RequestClassifier::new(
//!     ClassificationTable::new().with_resource("/documents", "document"),
//! );
//! let authorizer = Authorizer::new(Arc::new(handle), classifier, FallbackChain::default());
//!
//! let request = AccessRequest::new("alice", "PATCH", "/documents/42").with_path_param("id", "42");
//! let outcome = authorizer.authorize(&request).unwrap();
//! assert_eq!(outcome.decision, Decision::Allowed);
//! assert_eq!(outcome.action, "update");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod reload;
pub mod roles;

use std::sync::Arc;
use std::time::Instant;

use praetor_classify::RequestClassifier;
use praetor_core::{AccessRequest, Decision};
use praetor_telemetry::metrics as telemetry_metrics;
use tracing::{debug, instrument, warn};

// Re-exports for convenience
pub use admin::{PolicyAdmin, DEFAULT_ACTIONS};
pub use cache::{CacheConfig, CacheStats, DecisionCache};
pub use config::{EnforcerConfig, DEFAULT_MAX_ROLE_DEPTH};
pub use engine::{CompiledEnforcer, PolicyFilter};
pub use error::{AuthzError, AuthzResult, ErrorKind};
pub use fallback::{Enforce, FallbackChain, FallbackContext, FallbackRule, FallbackTrigger};
pub use reload::{EnforcerHandle, ReloadOutcome};
pub use roles::{has_required_roles, RoleGraph, RoleRequirement};

/// Result of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationOutcome {
    /// Final decision after fallback rules.
    pub decision: Decision,
    /// Classified resource (empty if unmapped).
    pub resource: String,
    /// Classified action (empty if unmapped).
    pub action: String,
    /// Generation of the snapshot that decided.
    pub generation: u64,
    /// Name of the fallback rule that granted, if any.
    pub fallback_rule: Option<String>,
}

/// Request-level authorization.
///
/// Every call evaluates against a single snapshot, so a reload that lands
/// mid-request never mixes two policy versions.
#[derive(Debug, Clone)]
pub struct Authorizer {
    handle: Arc<EnforcerHandle>,
    classifier: RequestClassifier,
    fallback: Arc<FallbackChain>,
}

impl Authorizer {
    /// Creates an authorizer.
    pub fn new(
        handle: Arc<EnforcerHandle>,
        classifier: RequestClassifier,
        fallback: FallbackChain,
    ) -> Self {
        Self {
            handle,
            classifier,
            fallback: Arc::new(fallback),
        }
    }

    /// The enforcer handle.
    pub fn handle(&self) -> &Arc<EnforcerHandle> {
        &self.handle
    }

    /// The request classifier.
    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    /// The fallback chain.
    pub fn fallback(&self) -> &FallbackChain {
        &self.fallback
    }

    /// Authorizes one request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Evaluation`] if the matcher faults. Callers
    /// must not treat a fault as a denial.
    #[instrument(skip_all, fields(subject = %request.subject, method = %request.method, path = %request.path))]
    pub fn authorize(&self, request: &AccessRequest) -> AuthzResult<AuthorizationOutcome> {
        let started = Instant::now();
        let result = self.decide(request);

        match &result {
            Ok(outcome) => {
                telemetry_metrics::record_decision(outcome.decision.as_str(), started.elapsed());
                if let Some(rule) = &outcome.fallback_rule {
                    telemetry_metrics::record_fallback_grant(rule);
                }
            }
            Err(e) => {
                warn!(error = %e, "authorization fault");
                telemetry_metrics::record_decision("error", started.elapsed());
            }
        }
        result
    }

    /// Enforces the raw `path` and `method` as resource and action.
    ///
    /// For policies written directly against routes, such as
    /// `p, admin, /api/v1/users, GET`. No classification or fallback
    /// rules are applied.
    ///
    /// # Errors
    ///
    /// See [`Self::authorize`].
    #[instrument(skip(self))]
    pub fn authorize_route(
        &self,
        subject: &str,
        path: &str,
        method: &str,
    ) -> AuthzResult<AuthorizationOutcome> {
        let started = Instant::now();
        let snapshot = self.handle.snapshot();
        let decision = match snapshot.enforce(subject, path, method) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "authorization fault");
                telemetry_metrics::record_decision("error", started.elapsed());
                return Err(e);
            }
        };
        telemetry_metrics::record_decision(decision.as_str(), started.elapsed());

        Ok(AuthorizationOutcome {
            decision,
            resource: path.to_string(),
            action: method.to_string(),
            generation: snapshot.generation(),
            fallback_rule: None,
        })
    }

    /// Checks `subject` against a role requirement on the active snapshot.
    ///
    /// # Errors
    ///
    /// Never fails for in-memory snapshots.
    pub fn require_roles(
        &self,
        subject: &str,
        requirement: &RoleRequirement,
    ) -> AuthzResult<Decision> {
        self.handle
            .snapshot()
            .has_required_roles(subject, requirement.roles(), requirement.mode())
    }

    fn decide(&self, request: &AccessRequest) -> AuthzResult<AuthorizationOutcome> {
        let snapshot = self.handle.snapshot();
        let generation = snapshot.generation();

        if request.is_unauthenticated() {
            return Ok(AuthorizationOutcome {
                decision: Decision::Unauthenticated,
                resource: String::new(),
                action: String::new(),
                generation,
                fallback_rule: None,
            });
        }

        let classification =
            self.classifier
                .classify(&request.path, &request.path_params, &request.method);

        let mut decision =
            snapshot.enforce(&request.subject, &classification.resource, &classification.action)?;
        let mut fallback_rule = None;

        if decision.is_denied() && classification.is_complete() && !self.fallback.is_empty() {
            let ctx = FallbackContext {
                resource: &classification.resource,
                action: &classification.action,
                query_params: &request.query_params,
            };
            if let Some(rule) = self
                .fallback
                .evaluate(snapshot.as_ref(), &request.subject, &ctx)?
            {
                debug!(rule = rule.name(), "granted by fallback rule");
                decision = Decision::Allowed;
                fallback_rule = Some(rule.name().to_string());
            }
        }

        Ok(AuthorizationOutcome {
            decision,
            resource: classification.resource,
            action: classification.action,
            generation,
            fallback_rule,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use praetor_classify::ClassificationTable;
    use praetor_core::{MatchMode, PolicyRows};
    use praetor_model::DEFAULT_MODEL;

    fn authorizer(rows: PolicyRows) -> Authorizer {
        let handle = EnforcerHandle::new(DEFAULT_MODEL, rows, EnforcerConfig::default()).unwrap();
        let classifier = RequestClassifier::new(
            ClassificationTable::new()
                .with_resource("/api/v1/branches", "branch")
                .with_resource("/api/v1/vendors", "vendor")
                .with_resource("/documents", "document"),
        );
        Authorizer::new(Arc::new(handle), classifier, FallbackChain::with_defaults())
    }

    #[test]
    fn test_unauthenticated_short_circuits() {
        let authorizer = authorizer(PolicyRows::new());
        let request = AccessRequest::new("", "GET", "/documents");
        let outcome = authorizer.authorize(&request).unwrap();
        assert_eq!(outcome.decision, Decision::Unauthenticated);
        assert!(outcome.resource.is_empty());
    }

    #[test]
    fn test_unmapped_path_denied() {
        let authorizer = authorizer(PolicyRows::new().with_rule("alice", "document", "list"));
        let request = AccessRequest::new("alice", "GET", "/unknown");
        let outcome = authorizer.authorize(&request).unwrap();
        assert_eq!(outcome.decision, Decision::Denied);
        assert!(outcome.resource.is_empty());
        assert_eq!(outcome.action, "list");
    }

    #[test]
    fn test_fallback_grant_is_reported() {
        let authorizer = authorizer(
            PolicyRows::new()
                .with_rule("sorter", "branchSorting", "list")
                .with_assignment("sam", "sorter"),
        );

        let request = AccessRequest::new("sam", "GET", "/api/v1/branches")
            .with_query_param("isSorting", "true");
        let outcome = authorizer.authorize(&request).unwrap();
        assert_eq!(outcome.decision, Decision::Allowed);
        assert_eq!(outcome.fallback_rule.as_deref(), Some("branch-sorting"));

        let request = AccessRequest::new("sam", "GET", "/api/v1/branches");
        let outcome = authorizer.authorize(&request).unwrap();
        assert_eq!(outcome.decision, Decision::Denied);
        assert!(outcome.fallback_rule.is_none());
    }

    #[test]
    fn test_direct_grant_skips_fallback() {
        let authorizer = authorizer(PolicyRows::new().with_rule("vic", "vendor", "list"));
        let request = AccessRequest::new("vic", "GET", "/api/v1/vendors");
        let outcome = authorizer.authorize(&request).unwrap();
        assert_eq!(outcome.decision, Decision::Allowed);
        assert!(outcome.fallback_rule.is_none());
        assert_eq!(outcome.generation, 1);
    }

    #[test]
    fn test_authorize_route_uses_raw_path() {
        let authorizer = authorizer(
            PolicyRows::new()
                .with_rule("admin", "/api/v1/users", "GET")
                .with_assignment("ada", "admin"),
        );

        let outcome = authorizer.authorize_route("ada", "/api/v1/users", "GET").unwrap();
        assert_eq!(outcome.decision, Decision::Allowed);
        assert_eq!(outcome.resource, "/api/v1/users");

        let outcome = authorizer.authorize_route("ada", "/api/v1/users", "DELETE").unwrap();
        assert_eq!(outcome.decision, Decision::Denied);

        let outcome = authorizer.authorize_route("", "/api/v1/users", "GET").unwrap();
        assert_eq!(outcome.decision, Decision::Unauthenticated);
    }

    #[test]
    fn test_require_roles() {
        let authorizer = authorizer(
            PolicyRows::new()
                .with_assignment("alice", "editor")
                .with_assignment("editor", "viewer"),
        );

        let all = RoleRequirement::new(["editor", "viewer"], MatchMode::MatchAll);
        assert_eq!(authorizer.require_roles("alice", &all).unwrap(), Decision::Allowed);

        let any = RoleRequirement::new(["admin", "viewer"], MatchMode::AtLeastOne);
        assert_eq!(authorizer.require_roles("alice", &any).unwrap(), Decision::Allowed);

        let admin = RoleRequirement::new(["admin"], MatchMode::MatchAll);
        assert_eq!(authorizer.require_roles("alice", &admin).unwrap(), Decision::Denied);
        assert_eq!(
            authorizer.require_roles("", &admin).unwrap(),
            Decision::Unauthenticated
        );
    }
}
