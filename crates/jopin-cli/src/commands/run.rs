//! Run command implementation.
//!
//! Wires the pieces together:
//! - Launch settings from package.json, environment and flags
//! - Browser refresh channel (watch mode only)
//! - Executable resolution and child environment
//! - Signal relay and file watcher feeding the supervisor

use crate::config::{EnvOverrides, LaunchSettings, SupervisorConfig, WatchMode};
use crate::dev::server::PORT_RANGE;
use crate::dev::{
    ExitOutcome, FileWatcher, NotificationServer, ProcessLauncher, RefreshHub, Supervisor,
    resolve, spawn_signal_listener,
};
use crate::error::{Result, ResultExt};
use crate::ui;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Execute the run command.
///
/// # Process Flow
///
/// 1. Merge the launch settings
/// 2. In watch mode, open the refresh channel
/// 3. Resolve the runtime and build the child environment
/// 4. Install signal handlers, start the watcher in restart mode
/// 5. Supervise until the child ends or a signal stops us
///
/// # Errors
///
/// Returns errors for:
/// - An invalid forced channel port, or one that cannot be bound
/// - Watcher setup failures
/// - A runtime that cannot be spawned
pub async fn execute(engine: &str, args: &[String]) -> Result<ExitOutcome> {
    let env = EnvOverrides::from_env()?;
    let cwd = std::env::current_dir().context("Cannot read the working directory")?;
    let settings = LaunchSettings::load(engine, args, &cwd, &env)?;

    tracing::debug!(
        "watch mode {:?}, development {}, roots {:?}",
        settings.watch_mode,
        settings.is_development,
        settings.watch_roots
    );

    let (hub, channel_url, channel_task) = if settings.watch_mode.is_enabled() {
        let channel = open_channel(settings.forced_port).await?;
        ui::success("Source watching enabled");
        channel
    } else {
        (None, None, None)
    };

    let executable = resolve(engine);
    tracing::debug!("{} resolved to {}", engine, executable.display());

    let environment = settings.child_environment(parent_environment(), channel_url.as_deref());
    let config = SupervisorConfig::from_settings(
        &settings,
        executable.to_string_lossy().into_owned(),
        environment,
    );

    let supervisor = Supervisor::new(config, ProcessLauncher, hub);
    let signals = spawn_signal_listener(supervisor.events_sender())?;

    let watcher = match settings.watch_mode {
        WatchMode::Restart => Some(FileWatcher::new(
            settings.watch_roots.clone(),
            settings.file_stability,
            supervisor.events_sender(),
        )?),
        WatchMode::Hot | WatchMode::Off => None,
    };

    let outcome = supervisor.run().await;

    drop(watcher);
    signals.abort();
    if let Some(task) = channel_task {
        task.abort();
    }

    outcome
}

type Channel = (Option<Arc<RefreshHub>>, Option<String>, Option<JoinHandle<()>>);

/// Bind and serve the refresh channel. Running out of ports only disables
/// browser refresh; a forced port that cannot be bound is fatal.
async fn open_channel(forced_port: Option<u16>) -> Result<Channel> {
    let Some(server) = NotificationServer::bind(forced_port).await? else {
        ui::warning(&format!(
            "No free port between {} and {}, browser refresh disabled",
            PORT_RANGE.start,
            PORT_RANGE.end - 1
        ));
        return Ok((None, None, None));
    };

    let url = server.url();
    tracing::debug!("refresh channel listening on {}", url);

    let hub = Arc::new(RefreshHub::new());
    let served = Arc::clone(&hub);
    let task = tokio::spawn(async move {
        if let Err(e) = server.serve(served).await {
            ui::warning(&e.to_string());
        }
    });

    Ok((Some(hub), Some(url), Some(task)))
}

/// Parent environment, skipping entries that are not valid UTF-8.
fn parent_environment() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}
