//! Launch configuration with multi-source loading.
//!
//! Priority: CLI flags > environment variables > package.json > defaults.
//!
//! Loading happens in two steps. [`LaunchSettings::load`] merges every source
//! into the watch decision, watch roots and child arguments. Once the
//! notification channel is open, [`SupervisorConfig::from_settings`] freezes
//! the result into the immutable snapshot the supervisor runs with.

mod defaults;
mod env;
mod manifest;

use crate::cli::split_watch_flags;
use crate::error::Result;
use crate::ui;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use defaults::*;
pub use env::{EnvOverrides, WatchOverride};
pub use manifest::{JopiSection, PackageManifest, find_package_json};

/// Set to `1` in the child when source watching is active.
pub const ENV_SOURCE_WATCHING_ENABLED: &str = "JOPIN_SOURCE_WATCHING_ENABLED";

/// Set to `1` in the child when the notification channel is open.
pub const ENV_BROWSER_REFRESH_ENABLED: &str = "JOPIN_BROWSER_REFRESH_ENABLED";

/// Address of the notification channel, passed to the child.
pub const ENV_WEBSOCKET_URL: &str = "JOPIN_WEBSOCKET_URL";

/// Forces the notification channel port.
pub const ENV_WEBSOCKET_PORT: &str = "JOPIN_WEBSOCKET_PORT";

/// How source changes are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// No watching; the supervisor is a transparent wrapper
    Off,
    /// The supervisor restarts the child after changes
    Restart,
    /// The runtime reloads in place (`--hot`); no supervisor restarts
    Hot,
}

impl WatchMode {
    /// Whether the notification channel and watch env vars are needed.
    pub fn is_enabled(self) -> bool {
        !matches!(self, WatchMode::Off)
    }
}

/// Merged launch decisions, before the notification channel exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Runtime name as given on the command line
    pub engine: String,
    /// Working directory of the child
    pub cwd: PathBuf,
    /// User arguments with the watch flags removed
    pub forwarded_args: Vec<String>,
    /// Modules preloaded into the runtime, loader first
    pub preload: Vec<String>,
    pub watch_mode: WatchMode,
    /// `NODE_ENV` is not `production`
    pub is_development: bool,
    /// Absolute directories to watch
    pub watch_roots: Vec<PathBuf>,
    pub restart_debounce: Duration,
    pub file_stability: Duration,
    /// Port forced through `JOPIN_WEBSOCKET_PORT`
    pub forced_port: Option<u16>,
}

impl LaunchSettings {
    /// Merge defaults, `package.json`, environment and CLI flags.
    ///
    /// A missing or malformed manifest only produces a warning: the loop
    /// still works on defaults.
    pub fn load(engine: &str, args: &[String], cwd: &Path, env: &EnvOverrides) -> Result<Self> {
        let (forwarded_args, flags) = split_watch_flags(args);
        let is_development = !env.production;

        let project_dir = find_package_json(cwd);
        let manifest = match &project_dir {
            Some(dir) => {
                let path = dir.join("package.json");
                tracing::debug!("package.json found at {}", path.display());
                PackageManifest::load(&path).unwrap_or_else(|e| {
                    ui::warning(&e.to_string());
                    PackageManifest::default()
                })
            }
            None => {
                if is_development {
                    ui::warning("package.json not found, can't enable file watching from it");
                }
                PackageManifest::default()
            }
        };

        let mut watch = is_development;
        let mut hot = is_development && engine == "bun";

        if let Some(value) = manifest.jopi.watch {
            watch = value;
        }
        if manifest.jopi.hot == Some(true) {
            hot = true;
        }

        match env.watch {
            Some(WatchOverride::Disabled) => watch = false,
            Some(WatchOverride::Enabled) => watch = true,
            Some(WatchOverride::Hot) => {
                watch = true;
                hot = true;
            }
            None => {}
        }

        if flags.force_watch {
            watch = true;
        }
        if let Some(value) = flags.hot {
            hot = value;
        }

        let watch_mode = match (watch, hot) {
            (false, _) => WatchMode::Off,
            (true, true) => WatchMode::Hot,
            (true, false) => WatchMode::Restart,
        };

        let base_dir = project_dir.unwrap_or_else(|| cwd.to_path_buf());
        let watch_roots = if !flags.watch_paths.is_empty() {
            absolutize_all(&flags.watch_paths, cwd)
        } else if !manifest.jopi.watch_dirs.is_empty() {
            absolutize_all(&manifest.jopi.watch_dirs, &base_dir)
        } else {
            let src = base_dir.join("src");
            if src.is_dir() { vec![src] } else { vec![base_dir] }
        };

        let mut preload = vec![LOADER_MODULE.to_string()];
        for module in manifest.preload_modules() {
            if !preload.contains(&module) {
                preload.push(module);
            }
        }

        Ok(Self {
            engine: engine.to_string(),
            cwd: cwd.to_path_buf(),
            forwarded_args,
            preload,
            watch_mode,
            is_development,
            watch_roots,
            restart_debounce: Duration::from_millis(manifest.jopi.restart_debounce_ms),
            file_stability: Duration::from_millis(manifest.jopi.file_stability_ms),
            forced_port: env.forced_port,
        })
    }

    /// Flag used to preload a module, when the engine supports one.
    pub fn preload_flag(&self) -> Option<&'static str> {
        match engine_stem(&self.engine) {
            "node" => Some("--import"),
            "bun" => Some("--preload"),
            _ => None,
        }
    }

    /// Full argument list for the child: the hot flag, preload flags, then
    /// the forwarded arguments.
    pub fn child_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.watch_mode == WatchMode::Hot {
            args.push("--hot".to_string());
        }

        if let Some(flag) = self.preload_flag() {
            for module in &self.preload {
                args.push(flag.to_string());
                args.push(module.clone());
            }
        }

        args.extend(self.forwarded_args.iter().cloned());
        args
    }

    /// Parent environment overlaid with the supervisor's variables.
    pub fn child_environment<I>(&self, parent: I, channel_url: Option<&str>) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env: BTreeMap<String, String> = parent.into_iter().collect();

        if self.watch_mode.is_enabled() {
            env.insert(ENV_SOURCE_WATCHING_ENABLED.to_string(), "1".to_string());

            if let Some(url) = channel_url {
                env.insert(ENV_BROWSER_REFRESH_ENABLED.to_string(), "1".to_string());
                env.insert(ENV_WEBSOCKET_URL.to_string(), url.to_string());
            }
        }

        env
    }
}

/// Immutable snapshot the supervisor runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Resolved executable
    pub command: String,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub cwd: PathBuf,
    pub watch_roots: Vec<PathBuf>,
    pub watch_mode: WatchMode,
    pub is_development: bool,
    pub restart_debounce: Duration,
    pub file_stability: Duration,
    pub grace_delay: Duration,
    pub escalation_delay: Duration,
    pub refresh_delay: Duration,
}

impl SupervisorConfig {
    /// Freeze the launch settings together with the resolved executable and
    /// the final child environment.
    pub fn from_settings(
        settings: &LaunchSettings,
        command: String,
        environment: BTreeMap<String, String>,
    ) -> Self {
        Self {
            command,
            arguments: settings.child_args(),
            environment,
            cwd: settings.cwd.clone(),
            watch_roots: settings.watch_roots.clone(),
            watch_mode: settings.watch_mode,
            is_development: settings.is_development,
            restart_debounce: settings.restart_debounce,
            file_stability: settings.file_stability,
            grace_delay: RESPAWN_GRACE,
            escalation_delay: KILL_ESCALATION,
            refresh_delay: REFRESH_DELAY,
        }
    }
}

/// `node.exe` and `/usr/bin/node` both name the `node` engine.
fn engine_stem(engine: &str) -> &str {
    Path::new(engine)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(engine)
}

fn absolutize_all(paths: &[PathBuf], base: &Path) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
        .collect()
}
