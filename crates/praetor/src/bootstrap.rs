//! Wiring a running engine from configuration.

use std::future::Future;
use std::sync::Arc;

use praetor_authz::{Authorizer, AuthzError, EnforcerHandle, PolicyAdmin};
use praetor_classify::RequestClassifier;
use praetor_config::{ConfigError, PraetorConfig, StoreKind};
use praetor_core::PolicyRows;
use praetor_store::{
    FilePolicyStore, MemoryPolicyStore, MutablePolicyStore, PolicyChange, PolicyFileChangeKind,
    PolicyFileWatcher, PolicyStore, StoreError, StoreResult,
};
use praetor_telemetry::TelemetryError;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors raised while starting Praetor.
#[derive(Debug, Error)]
pub enum PraetorError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The startup policy could not be compiled.
    #[error(transparent)]
    Authz(#[from] AuthzError),

    /// The policy store or file watcher failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

/// The policy store selected by configuration.
#[derive(Debug)]
pub enum ConfiguredStore {
    /// In-process rows.
    Memory(MemoryPolicyStore),
    /// A policy file.
    File(FilePolicyStore),
}

impl ConfiguredStore {
    /// Builds the store named by the `store` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] if the file store has no path.
    pub fn from_config(config: &PraetorConfig) -> Result<Self, ConfigError> {
        match config.store.kind {
            StoreKind::Memory => Ok(Self::Memory(MemoryPolicyStore::default())),
            StoreKind::File => {
                let path = config
                    .store
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::missing_field("store.path"))?;
                Ok(Self::File(FilePolicyStore::new(path)))
            }
        }
    }
}

impl PolicyStore for ConfiguredStore {
    fn load(&self) -> impl Future<Output = StoreResult<PolicyRows>> + Send {
        async move {
            match self {
                Self::Memory(store) => store.load().await,
                Self::File(store) => store.load().await,
            }
        }
    }
}

impl MutablePolicyStore for ConfiguredStore {
    fn apply(&self, change: PolicyChange) -> impl Future<Output = StoreResult<()>> + Send {
        async move {
            match self {
                Self::Memory(store) => store.apply(change).await,
                Self::File(store) => store.apply(change).await,
            }
        }
    }
}

/// A running authorization engine.
///
/// Dropping it stops the policy file watch task, if one was started.
#[derive(Debug)]
pub struct Praetor {
    config: PraetorConfig,
    authorizer: Authorizer,
    admin: PolicyAdmin<ConfiguredStore>,
    watch_task: Option<JoinHandle<()>>,
}

impl Praetor {
    /// Builds the engine described by `config`.
    ///
    /// Reads the model and the store, compiles the first snapshot and, if
    /// `store.watch` is set, starts a task that reloads whenever the policy
    /// file changes. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, the model or store can not be
    /// read, the policy does not compile, or the watcher can not start.
    pub async fn bootstrap(config: PraetorConfig) -> Result<Self, PraetorError> {
        config.validate()?;

        let model_source = config.model_source()?;
        let store = Arc::new(ConfiguredStore::from_config(&config)?);
        let handle = Arc::new(
            EnforcerHandle::from_store(&model_source, store.as_ref(), config.enforcer_config())
                .await?,
        );

        let classifier = RequestClassifier::new(config.classification.clone());
        let authorizer = Authorizer::new(
            Arc::clone(&handle),
            classifier,
            config.fallback.to_chain(),
        );
        let admin = PolicyAdmin::new(Arc::clone(&store), Arc::clone(&handle))
            .with_actions(config.admin.actions.iter().cloned());

        let watch_task = match (&config.store.path, config.store.watch) {
            (Some(path), true) => {
                let watcher = PolicyFileWatcher::builder()
                    .with_debounce(config.store.debounce())
                    .watch_file(path)?
                    .build()?;
                Some(spawn_policy_watcher(watcher, Arc::clone(&handle), store))
            }
            _ => None,
        };

        info!(
            store = ?config.store.kind,
            watch = watch_task.is_some(),
            fallback_rules = authorizer.fallback().rules().len(),
            generation = handle.generation(),
            "praetor started"
        );

        Ok(Self {
            config,
            authorizer,
            admin,
            watch_task,
        })
    }

    /// Request authorization.
    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    /// Policy administration.
    pub fn admin(&self) -> &PolicyAdmin<ConfiguredStore> {
        &self.admin
    }

    /// The live enforcer handle.
    pub fn handle(&self) -> &Arc<EnforcerHandle> {
        self.authorizer.handle()
    }

    /// The configuration this engine was built from.
    pub fn config(&self) -> &PraetorConfig {
        &self.config
    }

    /// Whether a policy file watch task is running.
    pub fn is_watching(&self) -> bool {
        self.watch_task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Praetor {
    fn drop(&mut self) {
        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
    }
}

/// Reloads `handle` from `store` every time `watcher` reports a change.
///
/// Removal events are ignored so an editor that deletes and recreates the
/// file does not trigger a failing reload in between. A failed reload is
/// logged and the previous policy stays active.
pub fn spawn_policy_watcher<S>(
    mut watcher: PolicyFileWatcher,
    handle: Arc<EnforcerHandle>,
    store: Arc<S>,
) -> JoinHandle<()>
where
    S: PolicyStore + 'static,
{
    tokio::spawn(async move {
        while let Some(change) = watcher.next().await {
            if change.kind == PolicyFileChangeKind::Removed {
                debug!(path = %change.path.display(), "policy file removed, keeping active policy");
                continue;
            }
            match handle.reload_from_store(store.as_ref()).await {
                Ok(outcome) => info!(
                    path = %change.path.display(),
                    generation = outcome.generation,
                    "policy file change applied"
                ),
                Err(e) => warn!(
                    path = %change.path.display(),
                    error = %e,
                    "policy file change rejected"
                ),
            }
        }
        debug!("policy file watcher stopped");
    })
}
