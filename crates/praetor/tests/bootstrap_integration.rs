//! Starts Praetor from configuration and drives it end to end.

use std::path::Path;
use std::time::Duration;

use praetor::config::{FallbackRuleConfig, FallbackTarget, StoreKind};
use praetor::prelude::*;

fn file_config(policy: &Path, watch: bool) -> PraetorConfig {
    let mut config = PraetorConfig::default();
    config.store.kind = StoreKind::File;
    config.store.path = Some(policy.to_path_buf());
    config.store.watch = watch;
    config.store.debounce_ms = 20;
    config.classification = ClassificationTable::new()
        .with_resource("/documents", "document")
        .with_resource("/reports", "report");
    config
}

/// Swaps file contents in one rename so the watcher never reads a partial write.
fn replace_file(path: &Path, contents: &str) {
    let staged = path.with_extension("staged");
    std::fs::write(&staged, contents).unwrap();
    std::fs::rename(&staged, path).unwrap();
}

async fn wait_for_generation(praetor: &Praetor, at_least: u64) -> bool {
    for _ in 0..200 {
        if praetor.handle().generation() >= at_least {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test]
async fn test_memory_bootstrap_and_admin() {
    let mut config = PraetorConfig::default();
    config.classification = ClassificationTable::new().with_resource("/documents", "document");
    let praetor = Praetor::bootstrap(config).await.unwrap();
    assert!(!praetor.is_watching());

    let request = AccessRequest::new("alice", "PATCH", "/documents/42").with_path_param("id", "42");
    assert_eq!(
        praetor.authorizer().authorize(&request).unwrap().decision,
        Decision::Denied
    );

    praetor
        .admin()
        .set_role_permissions("editor", "document", &["update"])
        .await
        .unwrap();
    praetor.admin().assign_role("alice", "editor").await.unwrap();

    let outcome = praetor.authorizer().authorize(&request).unwrap();
    assert_eq!(outcome.decision, Decision::Allowed);
    assert_eq!(outcome.generation, 3);
}

#[tokio::test]
async fn test_configured_fallback_rule() {
    let dir = tempfile::tempdir().unwrap();
    let policy = dir.path().join("policy.csv");
    std::fs::write(&policy, "p, auditor, audit, list\ng, ines, auditor\n").unwrap();

    let mut config = file_config(&policy, false);
    config.fallback.use_defaults = false;
    config.fallback.rules.push(FallbackRuleConfig {
        name: "reports-for-auditors".to_string(),
        override_resource: "audit".to_string(),
        override_action: "list".to_string(),
        targets: vec![FallbackTarget {
            resource: "report".to_string(),
            action: "list".to_string(),
        }],
        query: Default::default(),
    });

    let praetor = Praetor::bootstrap(config).await.unwrap();
    let outcome = praetor
        .authorizer()
        .authorize(&AccessRequest::new("ines", "GET", "/reports"))
        .unwrap();
    assert_eq!(outcome.decision, Decision::Allowed);
    assert_eq!(outcome.fallback_rule.as_deref(), Some("reports-for-auditors"));
}

#[tokio::test]
async fn test_missing_policy_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir.path().join("absent.csv"), false);
    let err = Praetor::bootstrap(config).await.unwrap_err();
    assert!(matches!(err, PraetorError::Authz(AuthzError::Configuration(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_change_triggers_reload() {
    let dir = tempfile::tempdir().unwrap();
    let policy = dir.path().join("policy.csv");
    std::fs::write(&policy, "p, alice, report, list\n").unwrap();

    let praetor = Praetor::bootstrap(file_config(&policy, true)).await.unwrap();
    assert!(praetor.is_watching());

    let request = AccessRequest::new("bob", "GET", "/reports");
    assert!(praetor.authorizer().authorize(&request).unwrap().decision.is_denied());

    replace_file(&policy, "p, alice, report, list\np, bob, report, list\n");
    assert!(wait_for_generation(&praetor, 2).await, "watcher did not reload");
    assert!(praetor.authorizer().authorize(&request).unwrap().decision.is_allowed());

    // A broken edit is rejected and the last good policy keeps serving.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let generation = praetor.handle().generation();
    replace_file(&policy, "p, bob, report\n");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(praetor.handle().generation(), generation);
    assert!(praetor.authorizer().authorize(&request).unwrap().decision.is_allowed());
}
