//! # Praetor
//!
//! **Request authorization with live policy reload**
//!
//! Praetor decides whether an authenticated subject may perform an action
//! on a resource:
//!
//! - **Classification**: raw paths and methods map to `(resource, action)`
//! - **Policy model**: Casbin-style request, policy, role and matcher sections
//! - **Roles**: transitive role inheritance with cycle protection
//! - **Fallback rules**: declarative exceptions for related permissions
//! - **Live reload**: atomic snapshot swap, the old policy survives a bad reload
//! - **Administration**: role permission edits that persist and reload
//!
//! ## Quick Start
//!
//! ```no_run
//! use praetor::prelude::*;
//!
//! # async fn run() -> Result<(), PraetorError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("praetor.toml")?
//!     .with_env_prefix("PRAETOR")
//!     .load()?;
//! praetor::init_telemetry(&config)?;
//!
//! let praetor = Praetor::bootstrap(config).await?;
//! let request = AccessRequest::new("alice", "PATCH", "/documents/42")
//!     .with_path_param("id", "42");
//!
//! match praetor.authorizer().authorize(&request)?.decision {
//!     Decision::Allowed => { /* continue */ }
//!     other => println!("{} {}", other.status_code(), other.public_message()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → Classifier → Enforcer → (denied) FallbackChain → Decision
//!                           ▲
//!   PolicyStore ── reload ──┘  (PolicyAdmin, file watcher)
//! ```

#![doc(html_root_url = "https://docs.rs/praetor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;

pub use bootstrap::{spawn_policy_watcher, ConfiguredStore, Praetor, PraetorError};

// Re-export core types
pub use praetor_core as core;

// Re-export the policy model
pub use praetor_model as model;

// Re-export policy stores
pub use praetor_store as store;

// Re-export request classification
pub use praetor_classify as classify;

// Re-export enforcement
pub use praetor_authz as authz;

// Re-export configuration
pub use praetor_config as config;

// Re-export telemetry
pub use praetor_telemetry as telemetry;

/// Installs logging and metrics as described by `config.telemetry`.
///
/// # Errors
///
/// Returns [`PraetorError::Telemetry`] if a global subscriber or metrics
/// recorder is already installed.
pub fn init_telemetry(config: &praetor_config::PraetorConfig) -> Result<(), PraetorError> {
    praetor_telemetry::init_telemetry(&config.telemetry.to_telemetry_config())?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use praetor::prelude::*;
///
/// let request = AccessRequest::new("alice", "GET", "/documents");
/// assert!(!request.is_unauthenticated());
/// ```
pub mod prelude {
    pub use crate::{init_telemetry, Praetor, PraetorError};

    pub use praetor_core::{AccessRequest, Decision, MatchMode, PolicyRows, PolicyRule, RoleAssignment};

    pub use praetor_authz::{
        AuthorizationOutcome, Authorizer, AuthzError, AuthzResult, EnforcerConfig,
        EnforcerHandle, ErrorKind, FallbackChain, FallbackRule, PolicyAdmin, ReloadOutcome,
        RoleRequirement,
    };

    pub use praetor_classify::{ClassificationTable, RequestClassifier};

    pub use praetor_config::{ConfigError, ConfigLoader, PraetorConfig};

    pub use praetor_store::{FilePolicyStore, MemoryPolicyStore, PolicyStore, StoreError};
}
