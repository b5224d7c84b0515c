//! Policy administration.
//!
//! [`PolicyAdmin`] applies a change to a writable store and then reloads
//! the enforcer from that store, so the change takes effect for every
//! request that starts after the call returns.

use std::sync::Arc;

use praetor_core::{field_violation, RoleAssignment};
use praetor_store::{MutablePolicyStore, PolicyChange};
use tracing::{info, instrument};

use crate::error::{AuthzError, AuthzResult};
use crate::reload::{EnforcerHandle, ReloadOutcome};

/// Actions accepted by [`PolicyAdmin::set_role_permissions`] by default.
pub const DEFAULT_ACTIONS: &[&str] = &["create", "update", "list", "delete", "get"];

/// Mutates a policy store and reloads the enforcer.
#[derive(Debug)]
pub struct PolicyAdmin<S> {
    store: Arc<S>,
    handle: Arc<EnforcerHandle>,
    actions: Vec<String>,
}

impl<S> Clone for PolicyAdmin<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            handle: Arc::clone(&self.handle),
            actions: self.actions.clone(),
        }
    }
}

impl<S: MutablePolicyStore> PolicyAdmin<S> {
    /// Creates an admin over `store` that reloads `handle`.
    pub fn new(store: Arc<S>, handle: Arc<EnforcerHandle>) -> Self {
        Self {
            store,
            handle,
            actions: DEFAULT_ACTIONS.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Replaces the accepted action vocabulary.
    pub fn with_actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// The accepted action vocabulary.
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replaces every rule of `role` on `resource` with one rule per action.
    ///
    /// An empty action list revokes all of the role's access to the
    /// resource.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidAction`] if an action is outside the
    ///   vocabulary; the store is not touched.
    /// - [`AuthzError::InvalidInput`] if a field could not be stored as
    ///   written (empty, padded, or holding `,`, `#` or a line break);
    ///   the store is not touched.
    /// - [`AuthzError::Store`] if the store rejects the change.
    /// - [`AuthzError::Reload`] if the changed policy does not compile;
    ///   the previous enforcer stays active.
    #[instrument(skip(self, actions))]
    pub async fn set_role_permissions<A: AsRef<str>>(
        &self,
        role: &str,
        resource: &str,
        actions: &[A],
    ) -> AuthzResult<ReloadOutcome> {
        require_field("role", role)?;
        require_field("resource", resource)?;

        let mut validated = Vec::with_capacity(actions.len());
        for action in actions {
            let action = action.as_ref();
            if !self.actions.iter().any(|a| a == action) {
                return Err(AuthzError::invalid_action(action, &self.actions));
            }
            require_field("action", action)?;
            validated.push(action.to_string());
        }

        self.apply(PolicyChange::ReplaceRules {
            subject_or_role: role.to_string(),
            resource: resource.to_string(),
            actions: validated,
        })
        .await
    }

    /// Grants `role` to `subject`.
    ///
    /// # Errors
    ///
    /// See [`Self::set_role_permissions`].
    #[instrument(skip(self))]
    pub async fn assign_role(&self, subject: &str, role: &str) -> AuthzResult<ReloadOutcome> {
        require_field("subject", subject)?;
        require_field("role", role)?;
        self.apply(PolicyChange::AssignRole(RoleAssignment::new(subject, role)))
            .await
    }

    /// Removes `role` from `subject`.
    ///
    /// # Errors
    ///
    /// See [`Self::set_role_permissions`].
    #[instrument(skip(self))]
    pub async fn revoke_role(&self, subject: &str, role: &str) -> AuthzResult<ReloadOutcome> {
        require_field("subject", subject)?;
        require_field("role", role)?;
        self.apply(PolicyChange::RevokeRole(RoleAssignment::new(subject, role)))
            .await
    }

    /// Reloads from the store without changing it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Reload`] if the store read or compile fails.
    pub async fn reload(&self) -> AuthzResult<ReloadOutcome> {
        self.handle.reload_from_store(self.store.as_ref()).await
    }

    async fn apply(&self, change: PolicyChange) -> AuthzResult<ReloadOutcome> {
        self.store.apply(change.clone()).await?;
        info!(?change, "policy change stored");
        self.reload().await
    }
}

fn require_field(field: &str, value: &str) -> AuthzResult<()> {
    match field_violation(value) {
        Some(reason) => Err(AuthzError::InvalidInput(format!("{field} {value:?} {reason}"))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnforcerConfig;
    use praetor_core::{Decision, PolicyRows, PolicyRule};
    use praetor_model::DEFAULT_MODEL;
    use praetor_store::MemoryPolicyStore;

    fn setup() -> (PolicyAdmin<MemoryPolicyStore>, Arc<EnforcerHandle>) {
        let rows = PolicyRows::new()
            .with_rule("clerk", "user", "list")
            .with_rule("clerk", "user", "delete")
            .with_assignment("dana", "clerk");
        let store = Arc::new(MemoryPolicyStore::new(rows.clone()));
        let handle = Arc::new(
            EnforcerHandle::new(DEFAULT_MODEL, rows, EnforcerConfig::default()).unwrap(),
        );
        (PolicyAdmin::new(store, Arc::clone(&handle)), handle)
    }

    #[tokio::test]
    async fn test_set_role_permissions_reloads() {
        let (admin, handle) = setup();

        let outcome = admin
            .set_role_permissions("clerk", "user", &["list", "create"])
            .await
            .unwrap();
        assert_eq!(outcome.generation, 2);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.enforce("dana", "user", "create").unwrap(), Decision::Allowed);
        assert_eq!(snapshot.enforce("dana", "user", "delete").unwrap(), Decision::Denied);
    }

    #[tokio::test]
    async fn test_invalid_action_leaves_store_untouched() {
        let (admin, handle) = setup();
        let before = admin.store().rows();

        let err = admin
            .set_role_permissions("clerk", "user", &["list", "approve"])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidAction { ref action, .. } if action == "approve"));
        assert_eq!(admin.store().rows(), before);
        assert_eq!(handle.generation(), 1);
    }

    #[tokio::test]
    async fn test_custom_vocabulary() {
        let (admin, handle) = setup();
        let admin = admin.with_actions(["approve"]);

        admin
            .set_role_permissions("clerk", "order", &["approve"])
            .await
            .unwrap();
        assert!(handle.snapshot().has_rule("clerk", "order", "approve"));
        assert_eq!(admin.actions(), ["approve"]);
    }

    #[tokio::test]
    async fn test_assign_and_revoke_role() {
        let (admin, handle) = setup();

        admin.assign_role("erin", "clerk").await.unwrap();
        assert!(handle.snapshot().enforce("erin", "user", "list").unwrap().is_allowed());

        admin.revoke_role("erin", "clerk").await.unwrap();
        assert!(handle.snapshot().enforce("erin", "user", "list").unwrap().is_denied());
        assert_eq!(handle.generation(), 3);
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let (admin, _) = setup();
        let err = admin.assign_role("", "clerk").await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(_)));

        let err = admin
            .set_role_permissions("clerk", " ", &["list"])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_separator_injection_rejected() {
        let (admin, handle) = setup();
        let before = admin.store().rows();

        let injected = "report, list\ng, mallory, admin\np, clerk, report";
        let err = admin
            .set_role_permissions("clerk", injected, &["list"])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(ref m) if m.starts_with("resource")));

        let err = admin
            .set_role_permissions("clerk", "issue#1", &["list"])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(_)));

        let err = admin.assign_role("mallory", "admin\n").await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(ref m) if m.starts_with("role")));

        let err = admin.revoke_role("dana, x", "clerk").await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(ref m) if m.starts_with("subject")));

        let admin = admin.with_actions(["list", "list,get"]);
        let err = admin
            .set_role_permissions("clerk", "user", &["list,get"])
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(ref m) if m.starts_with("action")));

        assert_eq!(admin.store().rows(), before);
        assert_eq!(handle.generation(), 1);
        assert!(handle.snapshot().roles_for("mallory").is_empty());
    }

    #[tokio::test]
    async fn test_revoke_all() {
        let (admin, handle) = setup();
        admin
            .set_role_permissions::<&str>("clerk", "user", &[])
            .await
            .unwrap();
        let snapshot = handle.snapshot();
        assert!(snapshot.rules_matching(&crate::PolicyFilter::new().subject_or_role("clerk")).is_empty());
        assert!(!snapshot.has_rule("clerk", "user", "list"));
        assert!(!admin.store().rows().rules.contains(&PolicyRule::new("clerk", "user", "list")));
    }
}
