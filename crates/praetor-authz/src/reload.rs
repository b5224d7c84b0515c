//! Live reload of the active enforcer.
//!
//! [`EnforcerHandle`] owns the single active [`CompiledEnforcer`]. Readers
//! take an `Arc` snapshot under a short read lock and keep using it for as
//! long as they like; a reload compiles a replacement first and only then
//! swaps the pointer. A failed compile leaves the active snapshot in place.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use praetor_core::PolicyRows;
use praetor_model::PolicyModel;
use praetor_store::PolicyStore;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::config::EnforcerConfig;
use crate::engine::CompiledEnforcer;
use crate::error::{AuthzError, AuthzResult};

/// Summary of a successful reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    /// Generation of the newly active snapshot.
    pub generation: u64,
    /// Generation it replaced.
    pub previous_generation: u64,
    /// Rules in the new snapshot.
    pub rules: usize,
    /// Role assignments in the new snapshot.
    pub assignments: usize,
    /// Time spent compiling and publishing.
    pub elapsed: Duration,
}

/// Swappable holder of the active enforcer.
#[derive(Debug)]
pub struct EnforcerHandle {
    active: RwLock<Arc<CompiledEnforcer>>,
    config: EnforcerConfig,
    reload_lock: Mutex<()>,
}

impl EnforcerHandle {
    /// Compiles the startup snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if the model or rows do not
    /// compile; the process has no safe policy to serve with.
    pub fn new(model_source: &str, rows: PolicyRows, config: EnforcerConfig) -> AuthzResult<Self> {
        let model = PolicyModel::parse(model_source).map_err(AuthzError::configuration)?;
        let enforcer =
            CompiledEnforcer::compile(model, rows, 1, &config).map_err(AuthzError::configuration)?;

        info!(
            generation = 1,
            rules = enforcer.rule_count(),
            assignments = enforcer.assignment_count(),
            "initial policy compiled"
        );
        praetor_telemetry::metrics::record_reload(true, 1);

        Ok(Self {
            active: RwLock::new(Arc::new(enforcer)),
            config,
            reload_lock: Mutex::new(()),
        })
    }

    /// Compiles the startup snapshot from a store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Configuration`] if the store cannot be read or
    /// the policy does not compile.
    pub async fn from_store<S: PolicyStore>(
        model_source: &str,
        store: &S,
        config: EnforcerConfig,
    ) -> AuthzResult<Self> {
        let rows = store.load().await.map_err(AuthzError::configuration)?;
        Self::new(model_source, rows, config)
    }

    /// The active snapshot.
    ///
    /// The returned `Arc` stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<CompiledEnforcer> {
        Arc::clone(&self.active.read())
    }

    /// Generation of the active snapshot.
    pub fn generation(&self) -> u64 {
        self.active.read().generation()
    }

    /// Configuration applied to each compiled snapshot.
    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Compiles `model_source` with `rows` and publishes the result.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Reload`] if compilation fails. The previous
    /// snapshot stays active.
    #[instrument(skip_all, fields(rules = rows.rules.len(), assignments = rows.assignments.len()))]
    pub async fn reload(&self, model_source: &str, rows: PolicyRows) -> AuthzResult<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();
        let model = match PolicyModel::parse(model_source) {
            Ok(model) => model,
            Err(e) => return Err(self.reject(e)),
        };
        self.publish(model, rows, started)
    }

    /// Publishes new rows under the active model.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Reload`] if the rows do not compile.
    #[instrument(skip_all, fields(rules = rows.rules.len(), assignments = rows.assignments.len()))]
    pub async fn reload_rows(&self, rows: PolicyRows) -> AuthzResult<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();
        let model = self.snapshot().model().clone();
        self.publish(model, rows, started)
    }

    /// Reads `store` and publishes its rows under the active model.
    ///
    /// Reloads are serialized, so a slow store read can not be overtaken
    /// by a later reload.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Reload`] if the store read or the compile
    /// fails.
    #[instrument(skip_all)]
    pub async fn reload_from_store<S: PolicyStore>(&self, store: &S) -> AuthzResult<ReloadOutcome> {
        let _guard = self.reload_lock.lock().await;
        let started = Instant::now();
        let rows = match store.load().await {
            Ok(rows) => rows,
            Err(e) => return Err(self.reject(e)),
        };
        let model = self.snapshot().model().clone();
        self.publish(model, rows, started)
    }

    /// Compiles and swaps. Callers hold `reload_lock`.
    fn publish(
        &self,
        model: PolicyModel,
        rows: PolicyRows,
        started: Instant,
    ) -> AuthzResult<ReloadOutcome> {
        let previous_generation = self.generation();
        let generation = previous_generation + 1;

        let enforcer = match CompiledEnforcer::compile(model, rows, generation, &self.config) {
            Ok(enforcer) => enforcer,
            Err(e) => return Err(self.reject(e)),
        };

        let outcome = ReloadOutcome {
            generation,
            previous_generation,
            rules: enforcer.rule_count(),
            assignments: enforcer.assignment_count(),
            elapsed: started.elapsed(),
        };

        let superseded = std::mem::replace(&mut *self.active.write(), Arc::new(enforcer));
        drop(superseded);

        info!(
            generation,
            previous_generation,
            rules = outcome.rules,
            assignments = outcome.assignments,
            elapsed_ms = outcome.elapsed.as_millis(),
            "policy reloaded"
        );
        praetor_telemetry::metrics::record_reload(true, generation);

        Ok(outcome)
    }

    fn reject(&self, cause: impl std::fmt::Display) -> AuthzError {
        let generation = self.generation();
        warn!(error = %cause, active_generation = generation, "policy reload rejected");
        praetor_telemetry::metrics::record_reload(false, generation);
        AuthzError::reload(cause)
    }
}
