//! Typed configuration for Praetor.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`PRAETOR__SECTION__KEY`)
//! - Strict parsing that fails on unknown fields
//! - Layered loading (defaults → file → env) followed by validation
//!
//! # Example
//!
//! ```no_run
//! use praetor_config::ConfigLoader;
//!
//! # fn main() -> Result<(), praetor_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("praetor.toml")?
//!     .with_env_prefix("PRAETOR")
//!     .load()?;
//!
//! println!("policy store: {:?}", config.store.kind);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [model]
//! path = "/etc/praetor/model.conf"
//!
//! [store]
//! kind = "file"
//! path = "/etc/praetor/policy.csv"
//! watch = true
//! debounce_ms = 500
//!
//! [enforcer]
//! max_role_depth = 10
//!
//! [cache]
//! enabled = true
//! max_entries = 10000
//! ttl_secs = 300
//!
//! [classification]
//! path_params = ["id", "name"]
//!
//! [classification.url_to_resource]
//! "/api/v1/documents" = "document"
//!
//! [fallback]
//! use_defaults = true
//!
//! [admin]
//! actions = ["create", "update", "list", "delete", "get"]
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::PraetorConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
