//! Request classification for Praetor.
//!
//! Turns a raw request path, its named path parameters and the HTTP method
//! into the `(resource, action)` pair that policies are written against.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use praetor_classify::{ClassificationTable, RequestClassifier};
//!
//! let classifier = RequestClassifier::new(
//!     ClassificationTable::new().with_resource("/documents", "document"),
//! );
//!
//! let params = HashMap::from([("id".to_string(), "42".to_string())]);
//! let c = classifier.classify("/documents/42", &params, "PATCH");
//! assert_eq!(c.resource, "document");
//! assert_eq!(c.action, "update");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classifier;
pub mod table;

pub use classifier::{strip_segments, Classification, RequestClassifier};
pub use table::{ClassificationTable, DEFAULT_METHOD_ACTIONS, DEFAULT_PATH_PARAMS};
