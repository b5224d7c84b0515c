//! Line-oriented policy file store.
//!
//! Each non-blank line is a comma-separated row; `#` starts a comment.
//!
//! ```text
//! # grants
//! p, editor, document, update
//! p, admin, user, delete
//!
//! # memberships
//! g, alice, editor
//! g, editor, viewer
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};

use praetor_core::{PolicyRows, PolicyRule, RoleAssignment};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::{MutablePolicyStore, PolicyChange, PolicyStore};

/// Parses policy file text.
///
/// `origin` is only used in error messages.
pub fn parse_policy_text(text: &str, origin: &Path) -> StoreResult<PolicyRows> {
    let mut rows = PolicyRows::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.iter().any(|f| f.is_empty()) {
            return Err(StoreError::parse(origin, line_no, "empty field"));
        }

        match fields.as_slice() {
            ["p", subject, resource, action] => {
                rows.rules.push(PolicyRule::new(*subject, *resource, *action));
            }
            ["g", subject, role] => {
                rows.assignments.push(RoleAssignment::new(*subject, *role));
            }
            ["p", ..] => {
                return Err(StoreError::parse(
                    origin,
                    line_no,
                    format!("policy row needs 3 fields, found {}", fields.len() - 1),
                ))
            }
            ["g", ..] => {
                return Err(StoreError::parse(
                    origin,
                    line_no,
                    format!("role row needs 2 fields, found {}", fields.len() - 1),
                ))
            }
            [kind, ..] => {
                return Err(StoreError::parse(
                    origin,
                    line_no,
                    format!("unknown row type {kind:?}"),
                ))
            }
            [] => {}
        }
    }

    Ok(rows)
}

/// Renders rows in the policy file format.
pub fn render_policy_text(rows: &PolicyRows) -> String {
    let mut out = String::new();
    for rule in &rows.rules {
        out.push_str(&rule.to_string());
        out.push('\n');
    }
    for assignment in &rows.assignments {
        out.push_str(&assignment.to_string());
        out.push('\n');
    }
    out
}

/// Store backed by a policy file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so readers never see a half-written file.
#[derive(Debug)]
pub struct FilePolicyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePolicyStore {
    /// Creates a store for `path`. The file is not read until [`PolicyStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_rows(path: &Path) -> StoreResult<PolicyRows> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            StoreError::Unavailable(format!("failed to read {}: {e}", path.display()))
        })?;
        let rows = parse_policy_text(&text, path)?;
        debug!(
            path = %path.display(),
            rules = rows.rules.len(),
            assignments = rows.assignments.len(),
            "loaded policy file"
        );
        Ok(rows)
    }
}

impl PolicyStore for FilePolicyStore {
    fn load(&self) -> impl Future<Output = StoreResult<PolicyRows>> + Send {
        let path = self.path.clone();
        async move { Self::read_rows(&path).await }
    }
}

impl MutablePolicyStore for FilePolicyStore {
    fn apply(&self, change: PolicyChange) -> impl Future<Output = StoreResult<()>> + Send {
        async move {
            let _guard = self.write_lock.lock().await;

            let mut rows = Self::read_rows(&self.path).await?;
            change.apply_to(&mut rows);

            let text = render_policy_text(&rows);
            if parse_policy_text(&text, &self.path).ok().as_ref() != Some(&rows) {
                return Err(StoreError::Unsupported(format!(
                    "{change:?} can not be written to {} without changing its meaning",
                    self.path.display()
                )));
            }

            let mut tmp = self.path.clone().into_os_string();
            tmp.push(".tmp");
            let tmp = PathBuf::from(tmp);

            tokio::fs::write(&tmp, text).await?;
            tokio::fs::rename(&tmp, &self.path).await?;

            info!(path = %self.path.display(), ?change, "policy file updated");
            Ok(())
        }
    }
}
