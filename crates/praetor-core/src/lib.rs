//! # Praetor Core
//!
//! Core value types used throughout the Praetor authorization engine.
//!
//! - [`PolicyRule`] - a `(subject or role, resource, action)` grant
//! - [`RoleAssignment`] - a `(subject, role)` membership edge
//! - [`PolicyRows`] - one complete read of a policy store
//! - [`Decision`] - the routine outcome of an authorization check
//! - [`AccessRequest`] - the request facts an authorization check consumes
//! - [`MatchMode`] - role validation semantics
//! - [`field_violation`] - which strings are storable as policy fields

#![doc(html_root_url = "https://docs.rs/praetor-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod decision;
mod request;
mod rows;

pub use decision::{Decision, MatchMode};
pub use request::AccessRequest;
pub use rows::{field_violation, PolicyRows, PolicyRule, RoleAssignment};
