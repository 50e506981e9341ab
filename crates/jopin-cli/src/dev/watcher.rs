//! Source directory watcher.
//!
//! Each root gets its own recursive `notify` watcher. Raw events are filtered
//! at the source, then held back by a per-path stability window so a file is
//! only reported once writes to it have paused.

use crate::config::IGNORED_WATCH_DIRS;
use crate::dev::SupervisorEvent;
use crate::error::{Result, ResultExt};
use crate::ui;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

/// Watches the configured roots and reports stable changes as
/// [`SupervisorEvent::FileChanged`]. Watching stops when this is dropped.
pub struct FileWatcher {
    _watchers: Vec<RecommendedWatcher>,
    roots: Vec<PathBuf>,
    gate: JoinHandle<()>,
}

impl FileWatcher {
    /// Start watching `roots`.
    ///
    /// Roots that do not exist are skipped with a warning. Roots are
    /// canonicalized first, since some backends report canonical paths.
    ///
    /// # Errors
    ///
    /// Returns error if the platform watcher cannot be created or a root
    /// cannot be subscribed.
    pub fn new(
        roots: Vec<PathBuf>,
        stability: Duration,
        sink: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watchers = Vec::with_capacity(roots.len());
        let mut watched = Vec::with_capacity(roots.len());

        for root in roots {
            if !root.is_dir() {
                ui::warning(&format!(
                    "Watch directory {} does not exist, skipping",
                    root.display()
                ));
                continue;
            }

            let root = match root.canonicalize() {
                Ok(canonical) => canonical,
                Err(e) => {
                    tracing::debug!("cannot canonicalize {}: {}", root.display(), e);
                    root
                }
            };

            let tx = raw_tx.clone();
            let event_root = root.clone();
            let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("watch error: {}", e);
                        return;
                    }
                };

                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }

                for path in &event.paths {
                    if let Some(relative) = relevant_path(&event_root, path) {
                        let _ = tx.send(relative);
                    }
                }
            })?;

            watcher
                .watch(&root, RecursiveMode::Recursive)
                .context(format!("Failed to watch {}", root.display()))?;

            tracing::debug!("watching {}", root.display());
            watchers.push(watcher);
            watched.push(root);
        }

        // Only the watcher callbacks hold senders now
        drop(raw_tx);

        let gate = tokio::spawn(run_gate(raw_rx, stability, sink));

        Ok(Self {
            _watchers: watchers,
            roots: watched,
            gate,
        })
    }

    /// Roots that are actually being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.gate.abort();
    }
}

/// Path relative to `root`, or `None` when it is outside the root or inside
/// an ignored directory.
fn relevant_path(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;

    let ignored = relative.components().any(|component| match component {
        Component::Normal(name) => IGNORED_WATCH_DIRS.iter().any(|dir| name == *dir),
        _ => false,
    });

    if ignored || relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative.to_path_buf())
    }
}

async fn run_gate(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    stability: Duration,
    sink: mpsc::UnboundedSender<SupervisorEvent>,
) {
    let mut gate = StabilityGate::new(stability);

    loop {
        let deadline = gate.next_deadline();

        tokio::select! {
            received = raw.recv() => match received {
                Some(path) => gate.record(path, Instant::now()),
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                for path in gate.take_due(Instant::now()) {
                    if sink.send(SupervisorEvent::FileChanged(path)).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Per-path quiet-period tracking.
#[derive(Debug)]
struct StabilityGate {
    window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl StabilityGate {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// A write to `path` restarts its quiet period.
    fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now + self.window);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every path whose quiet period is over, sorted.
    fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();

        for path in &due {
            self.pending.remove(path);
        }

        due.sort();
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relevant_path() {
        let root = PathBuf::from("/project/src");

        assert_eq!(
            relevant_path(&root, Path::new("/project/src/routes/home.ts")),
            Some(PathBuf::from("routes/home.ts"))
        );
        assert_eq!(
            relevant_path(&root, Path::new("/project/src/node_modules/x/index.js")),
            None
        );
        assert_eq!(relevant_path(&root, Path::new("/project/src/.git/HEAD")), None);
        assert_eq!(relevant_path(&root, Path::new("/project/other/a.ts")), None);
        assert_eq!(relevant_path(&root, Path::new("/project/src")), None);
    }

    #[test]
    fn test_gate_waits_for_quiet_period() {
        let mut gate = StabilityGate::new(Duration::from_millis(300));
        let start = Instant::now();

        gate.record(PathBuf::from("a.ts"), start);
        gate.record(PathBuf::from("a.ts"), start + Duration::from_millis(200));
        gate.record(PathBuf::from("b.ts"), start + Duration::from_millis(100));

        assert_eq!(gate.next_deadline(), Some(start + Duration::from_millis(400)));
        assert!(gate.take_due(start + Duration::from_millis(350)).is_empty());
        assert_eq!(
            gate.take_due(start + Duration::from_millis(400)),
            vec![PathBuf::from("b.ts")]
        );
        assert_eq!(
            gate.take_due(start + Duration::from_millis(500)),
            vec![PathBuf::from("a.ts")]
        );
        assert_eq!(gate.next_deadline(), None);
    }

    #[tokio::test]
    async fn test_reports_stable_change() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let watcher =
            FileWatcher::new(vec![temp.path().to_path_buf()], Duration::from_millis(50), tx)
                .unwrap();
        assert_eq!(watcher.roots(), &[root.clone()]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(root.join("app.ts"), "export {}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no change reported")
            .unwrap();
        match event {
            SupervisorEvent::FileChanged(path) => assert_eq!(path, PathBuf::from("app.ts")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_root_reports_relative_paths() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let watcher = FileWatcher::new(vec![link], Duration::from_millis(50), tx).unwrap();
        assert_eq!(watcher.roots(), &[real.canonicalize().unwrap()]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(real.join("server.ts"), "export {}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no change reported")
            .unwrap();
        match event {
            SupervisorEvent::FileChanged(path) => assert_eq!(path, PathBuf::from("server.ts")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_skipped() {
        let temp = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();

        let watcher = FileWatcher::new(
            vec![temp.path().join("missing")],
            Duration::from_millis(50),
            tx,
        )
        .unwrap();
        assert!(watcher.roots().is_empty());
    }
}
