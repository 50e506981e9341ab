//! Restart debouncing.
//!
//! The debouncer only decides; the supervisor owns the timers. The window is
//! measured from the first qualifying change, later changes inside it are
//! coalesced, and an expiry that lands while a restart is still in flight is
//! remembered and re-armed once that restart finishes.

use std::path::{Component, Path, PathBuf};

/// Directory name that is always noise.
const DEPENDENCY_DIR: &str = "node_modules";

/// Result of reporting a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Hidden or dependency path, dropped
    Ignored,
    /// No timer was running; the caller must start one
    Armed,
    /// A timer is already running; the change is folded into it
    Coalesced,
}

/// Result of a debounce timer firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Start the restart sequence; carries the path that armed the window
    Restart(PathBuf),
    /// A restart is in flight; the expiry is kept for later
    Deferred,
}

#[derive(Debug, Default)]
pub struct RestartDebouncer {
    /// Path that armed the running timer
    armed: Option<PathBuf>,
    restarting: bool,
    /// Expiry that arrived during a restart
    deferred: Option<PathBuf>,
}

impl RestartDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, path: &Path) -> NotifyOutcome {
        if is_noise(path) {
            return NotifyOutcome::Ignored;
        }

        if self.armed.is_some() {
            return NotifyOutcome::Coalesced;
        }

        self.armed = Some(path.to_path_buf());
        NotifyOutcome::Armed
    }

    pub fn on_timer_elapsed(&mut self) -> TimerOutcome {
        let trigger = self.armed.take().unwrap_or_default();

        if self.restarting {
            self.deferred.get_or_insert(trigger);
            return TimerOutcome::Deferred;
        }

        self.restarting = true;
        TimerOutcome::Restart(trigger)
    }

    /// Mark the in-flight restart as done.
    ///
    /// Returns `true` when a deferred expiry was re-armed and the caller must
    /// start a new timer.
    pub fn restart_finished(&mut self) -> bool {
        self.restarting = false;

        match self.deferred.take() {
            Some(trigger) if self.armed.is_none() => {
                self.armed = Some(trigger);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn is_restarting(&self) -> bool {
        self.restarting
    }
}

/// Hidden segments and dependency directories are written by editors and
/// package managers, never by the developer.
pub fn is_noise(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(segment) => {
            let segment = segment.to_string_lossy();
            segment.starts_with('.') || segment == DEPENDENCY_DIR
        }
        _ => false,
    })
}
