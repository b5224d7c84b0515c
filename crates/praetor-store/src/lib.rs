//! Policy row storage for Praetor.
//!
//! A [`PolicyStore`] yields the complete set of policy rules and role
//! assignments the enforcer is compiled from. Stores that also implement
//! [`MutablePolicyStore`] accept administrative changes.
//!
//! Two stores ship with the crate:
//!
//! - [`MemoryPolicyStore`] keeps rows in memory
//! - [`FilePolicyStore`] reads and writes a line-oriented policy file
//!
//! [`PolicyFileWatcher`] reports changes to policy files so that callers
//! can trigger a reload.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file;
pub mod store;
pub mod watcher;

pub use error::{StoreError, StoreResult};
pub use file::{parse_policy_text, render_policy_text, FilePolicyStore};
pub use store::{MemoryPolicyStore, MutablePolicyStore, PolicyChange, PolicyStore};
pub use watcher::{PolicyFileChange, PolicyFileChangeKind, PolicyFileWatcher, PolicyFileWatcherBuilder};
