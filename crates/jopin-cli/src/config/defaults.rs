use std::time::Duration;

/// Debounce window measured from the first qualifying change.
pub const DEFAULT_RESTART_DEBOUNCE_MS: u64 = 500;

/// Quiet period a file must observe before its change is reported.
pub const DEFAULT_FILE_STABILITY_MS: u64 = 300;

/// Pause between killing the old child and spawning its replacement, so the
/// OS can release listening ports.
pub const RESPAWN_GRACE: Duration = Duration::from_millis(100);

/// Time a gracefully terminated child gets before it is hard-killed.
pub const KILL_ESCALATION: Duration = Duration::from_secs(1);

/// Delay between a spawn and the automatic browser refresh.
pub const REFRESH_DELAY: Duration = Duration::from_millis(100);

/// Module that installs the loader hooks in the child runtime. Always preloaded first.
pub const LOADER_MODULE: &str = "jopi-loader";

/// Dependencies that are preloaded automatically when a project declares them.
pub const KNOWN_PRELOAD_PACKAGES: &[&str] = &["jopi-rewrite"];

/// Directory names the watcher never descends into.
pub const IGNORED_WATCH_DIRS: &[&str] = &["node_modules", ".git", ".idea", ".vscode"];

pub fn default_restart_debounce_ms() -> u64 {
    DEFAULT_RESTART_DEBOUNCE_MS
}

pub fn default_file_stability_ms() -> u64 {
    DEFAULT_FILE_STABILITY_MS
}
