//! Development loop supervisor.
//!
//! Provides everything needed to keep a server running while its sources
//! change:
//! - Executable resolution on the search path
//! - Child process lifecycle with identity-tagged exit reporting
//! - Debounced restarts driven by a file watcher
//! - A WebSocket channel asking browsers to reload after a restart
//! - Signal relay and exit status propagation

pub mod debouncer;
pub mod exit;
pub mod process;
pub mod resolver;
pub mod server;
pub mod signals;
pub mod state;
pub mod supervisor;
pub mod watcher;

// Re-exports
pub use debouncer::{NotifyOutcome, RestartDebouncer, TimerOutcome};
pub use exit::terminate_like;
pub use process::{
    ChildCommand, ExitOutcome, Launcher, ManagedProcess, ProcessId, ProcessLauncher, Termination,
};
pub use resolver::resolve;
pub use server::NotificationServer;
pub use signals::spawn_signal_listener;
pub use state::{ChannelMessage, RefreshHub};
pub use supervisor::Supervisor;
pub use watcher::FileWatcher;

use std::path::PathBuf;

/// Everything the supervisor reacts to, delivered over a single channel.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// A watched file settled after a change (path relative to its root)
    FileChanged(PathBuf),

    /// The debounce window opened by the first change is over
    DebounceElapsed,

    /// The pause after killing the previous child is over
    GraceElapsed,

    /// A child exited
    ProcessExited { id: ProcessId, outcome: ExitOutcome },

    /// Waiting on a child failed
    ProcessFailed { id: ProcessId, error: std::io::Error },

    /// A gracefully terminated child had its chance
    EscalateKill { id: ProcessId },

    /// A termination signal reached the supervisor
    Shutdown(&'static str),
}
