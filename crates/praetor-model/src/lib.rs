//! Policy model grammar for Praetor.
//!
//! A [`PolicyModel`] describes how subjects, roles, resources and actions
//! combine into an allow decision. It is compiled once from text and then
//! evaluated per request by the enforcement engine.
//!
//! # Example
//!
//! ```
//! use praetor_model::{MatchEnv, PolicyModel};
//!
//! struct Env;
//!
//! impl MatchEnv for Env {
//!     fn has_role(&self, subject: &str, role: &str) -> bool {
//!         subject == role || (subject == "alice" && role == "editor")
//!     }
//! }
//!
//! let model = PolicyModel::default_rbac().unwrap();
//! let allowed = model
//!     .matches(
//!         &["alice", "document", "update"],
//!         &["editor", "document", "update"],
//!         &Env,
//!     )
//!     .unwrap();
//! assert!(allowed);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod matcher;
pub mod model;

pub use error::{ModelError, ModelResult};
pub use matcher::{key_match, Expr, MatchEnv};
pub use model::{PolicyModel, ACTION, DEFAULT_MODEL, RESOURCE, SUBJECT};
