//! Termination signal relay.
//!
//! **Unix platforms:** `SIGINT`, `SIGTERM` and `SIGHUP`.
//!
//! **Other platforms:** Ctrl-C via [`tokio::signal::ctrl_c`].
//!
//! Every delivery becomes a [`SupervisorEvent::Shutdown`]; the supervisor
//! decides how hard to stop the child.

use crate::dev::SupervisorEvent;
use crate::error::{Result, ResultExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Install the signal handlers and forward deliveries until the supervisor
/// stops listening.
///
/// Registration happens before this returns, so a signal arriving right after
/// the child is spawned is not lost.
#[cfg(unix)]
pub fn spawn_signal_listener(
    events: mpsc::UnboundedSender<SupervisorEvent>,
) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to listen for SIGHUP")?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
                _ = sighup.recv() => "SIGHUP",
            };

            if events.send(SupervisorEvent::Shutdown(name)).is_err() {
                break;
            }
        }
    }))
}

/// Install the signal handlers and forward deliveries until the supervisor
/// stops listening.
#[cfg(not(unix))]
pub fn spawn_signal_listener(
    events: mpsc::UnboundedSender<SupervisorEvent>,
) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if events.send(SupervisorEvent::Shutdown("Ctrl-C")).is_err() {
                break;
            }
        }
    }))
}
