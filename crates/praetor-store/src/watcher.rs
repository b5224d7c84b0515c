//! Change notifications for policy files.
//!
//! [`PolicyFileWatcher`] reports when a watched policy or model file is
//! created, modified or replaced. It watches the parent directory so that
//! atomic rename-over writes are seen, and filters events down to the
//! registered file names.
//!
//! # Example
//!
//! ```no_run
//! use praetor_store::PolicyFileWatcher;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), praetor_store::StoreError> {
//! let mut watcher = PolicyFileWatcher::builder()
//!     .with_debounce(Duration::from_millis(250))
//!     .watch_file("policy.csv")?
//!     .build()?;
//!
//! while let Some(change) = watcher.next().await {
//!     println!("policy changed: {}", change.path.display());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::{StoreError, StoreResult};

/// A debounced change to a watched file.
#[derive(Debug, Clone)]
pub struct PolicyFileChange {
    /// The file that changed.
    pub path: PathBuf,
    /// What happened to it.
    pub kind: PolicyFileChangeKind,
    /// When the change was observed.
    pub observed_at: Instant,
}

/// Kind of file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFileChangeKind {
    /// File appeared (including rename into place).
    Created,
    /// File contents changed.
    Modified,
    /// File was removed.
    Removed,
}

impl PolicyFileChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Modify(_) => Some(Self::Modified),
            EventKind::Remove(_) => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Builder for [`PolicyFileWatcher`].
#[derive(Debug)]
pub struct PolicyFileWatcherBuilder {
    files: Vec<PathBuf>,
    debounce: Duration,
}

impl Default for PolicyFileWatcherBuilder {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            debounce: Duration::from_millis(500),
        }
    }
}

impl PolicyFileWatcherBuilder {
    /// Set the debounce window. A change is reported once no further
    /// events arrive for this long. Default is 500ms.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Add a file to watch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Watch`] if the file's directory does not exist.
    pub fn watch_file(mut self, path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = absolute(path.as_ref())?;
        let parent_exists = path.parent().is_some_and(Path::is_dir);
        if !parent_exists {
            return Err(StoreError::Watch(format!(
                "directory of {} does not exist",
                path.display()
            )));
        }
        self.files.push(path);
        Ok(self)
    }

    /// Start watching.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Watch`] if no file was registered or the OS
    /// watcher cannot be created.
    pub fn build(self) -> StoreResult<PolicyFileWatcher> {
        if self.files.is_empty() {
            return Err(StoreError::Watch("no files to watch".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // Receiver may be gone during shutdown.
                let _ = tx.blocking_send(event);
            }
        })
        .map_err(|e| StoreError::Watch(format!("failed to create watcher: {e}")))?;

        let mut dirs = HashSet::new();
        for file in &self.files {
            if let Some(dir) = file.parent() {
                if dirs.insert(dir.to_path_buf()) {
                    watcher
                        .watch(dir, RecursiveMode::NonRecursive)
                        .map_err(|e| {
                            StoreError::Watch(format!("failed to watch {}: {e}", dir.display()))
                        })?;
                }
            }
        }

        debug!(files = ?self.files, "watching policy files");

        Ok(PolicyFileWatcher::from_parts(
            watcher,
            rx,
            self.files,
            self.debounce,
        ))
    }
}

/// Watches policy and model files for changes.
///
/// Bursts of events are coalesced: a change is reported once the file has
/// been quiet for the debounce window, carrying the last event's kind.
pub struct PolicyFileWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<Event>,
    files: Vec<PathBuf>,
    debounce: Duration,
}

impl std::fmt::Debug for PolicyFileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyFileWatcher")
            .field("files", &self.files)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl PolicyFileWatcher {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> PolicyFileWatcherBuilder {
        PolicyFileWatcherBuilder::default()
    }

    fn from_parts(
        watcher: RecommendedWatcher,
        rx: mpsc::Receiver<Event>,
        files: Vec<PathBuf>,
        debounce: Duration,
    ) -> Self {
        Self {
            _watcher: watcher,
            rx,
            files,
            debounce,
        }
    }

    /// Files being watched.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Waits for the next relevant change and for the file to settle.
    ///
    /// Only events for watched files push the settle deadline back;
    /// activity on other files in the same directory does not.
    ///
    /// Returns `None` once the underlying watcher stops.
    pub async fn next(&mut self) -> Option<PolicyFileChange> {
        let mut pending = loop {
            let event = self.rx.recv().await?;
            if let Some(change) = self.filter(&event) {
                break change;
            }
        };

        let settle = tokio::time::sleep(self.debounce);
        tokio::pin!(settle);
        loop {
            let event = tokio::select! {
                () = &mut settle => return Some(pending),
                event = self.rx.recv() => event,
            };
            let Some(event) = event else {
                return Some(pending);
            };
            if let Some(change) = self.filter(&event) {
                trace!(path = %change.path.display(), "coalesced policy file event");
                pending = change;
                settle
                    .as_mut()
                    .reset(tokio::time::Instant::now() + self.debounce);
            }
        }
    }

    fn filter(&self, event: &Event) -> Option<PolicyFileChange> {
        let kind = PolicyFileChangeKind::from_event(&event.kind)?;
        let path = event
            .paths
            .iter()
            .find(|p| self.files.iter().any(|f| same_file_name(f, p)))?
            .clone();

        Some(PolicyFileChange {
            path,
            kind,
            observed_at: Instant::now(),
        })
    }
}

fn absolute(path: &Path) -> StoreResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// Event paths may be canonicalized by the OS (e.g. /var -> /private/var),
// so compare the directory canonically and the file name literally.
fn same_file_name(watched: &Path, seen: &Path) -> bool {
    if watched.file_name() != seen.file_name() {
        return false;
    }
    let canonical = |p: &Path| p.parent().and_then(|d| d.canonicalize().ok());
    match (canonical(watched), canonical(seen)) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    fn watcher_for(dir: &TempDir, name: &str) -> PolicyFileWatcher {
        let path = dir.path().join(name);
        std::fs::write(&path, "").unwrap();
        PolicyFileWatcher::builder()
            .with_debounce(Duration::from_millis(100))
            .watch_file(&path)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_without_files_fails() {
        let err = PolicyFileWatcher::builder().build().unwrap_err();
        assert!(matches!(err, StoreError::Watch(_)));
    }

    #[test]
    fn test_missing_directory_fails() {
        let err = PolicyFileWatcher::builder()
            .watch_file("/nonexistent/praetor/policy.csv")
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_filters_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let watcher = watcher_for(&dir, "policy.csv");
        let other = dir.path().join("notes.txt");

        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Any));
        assert!(watcher.filter(&event(modify, &other)).is_none());
        let access = EventKind::Access(notify::event::AccessKind::Any);
        let policy = dir.path().join("policy.csv");
        assert!(watcher.filter(&event(access, &policy)).is_none());
        assert!(watcher.filter(&event(modify, &policy)).is_some());
    }

    #[tokio::test]
    async fn test_coalesces_bursts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policy.csv");
        let (tx, rx) = mpsc::channel(8);
        let inner = notify::recommended_watcher(|_: Result<Event, notify::Error>| {}).unwrap();
        let mut watcher = PolicyFileWatcher::from_parts(
            inner,
            rx,
            vec![path.clone()],
            Duration::from_millis(50),
        );

        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Any));
        tx.send(event(EventKind::Create(CreateKind::File), &path)).await.unwrap();
        tx.send(event(modify, &dir.path().join("other.txt"))).await.unwrap();
        tx.send(event(modify, &path)).await.unwrap();

        let change = watcher.next().await.unwrap();
        assert_eq!(change.kind, PolicyFileChangeKind::Modified);
        assert!(
            tokio::time::timeout(Duration::from_millis(100), watcher.next())
                .await
                .is_err()
        );

        drop(tx);
        assert!(watcher.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sibling_file_activity_does_not_delay_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("policy.csv");
        let log = dir.path().join("app.log");
        let (tx, rx) = mpsc::channel(64);
        let inner = notify::recommended_watcher(|_: Result<Event, notify::Error>| {}).unwrap();
        let mut watcher = PolicyFileWatcher::from_parts(
            inner,
            rx,
            vec![path.clone()],
            Duration::from_millis(100),
        );

        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Any));
        tx.send(event(modify, &path)).await.unwrap();
        let chatter = tokio::spawn(async move {
            for _ in 0..30 {
                if tx.send(event(modify, &log)).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        let started = std::time::Instant::now();
        let change = tokio::time::timeout(Duration::from_millis(400), watcher.next())
            .await
            .expect("change reported while the log file is busy")
            .unwrap();
        assert_eq!(change.path, path);
        assert!(started.elapsed() < Duration::from_millis(400));

        drop(watcher);
        chatter.await.unwrap();
    }

    #[tokio::test]
    async fn test_detects_rewrite() {
        let dir = TempDir::new().unwrap();
        let mut watcher = watcher_for(&dir, "policy.csv");
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(dir.path().join("policy.csv"), "p, a, b, c\n").unwrap();

        // File system events can be slow or missing on some CI hosts.
        if let Ok(Some(change)) =
            tokio::time::timeout(Duration::from_secs(2), watcher.next()).await
        {
            assert_eq!(change.path.file_name().unwrap(), "policy.csv");
        }
    }
}
