//! The restart loop.
//!
//! A single [`Supervisor`] owns the current child, the debouncer and the
//! optional refresh hub. Timers, the watcher, signal listeners and process
//! monitors only ever talk to it through [`SupervisorEvent`]s, so the
//! current-child slot is mutated from one place.
//!
//! Restart sequence:
//!
//! ```text
//! FileChanged ─▶ debounce ─▶ DebounceElapsed ─▶ hard kill, slot cleared
//!                                                      │ grace delay
//!                                                      ▼
//!                         restart finished ◀─ post-spawn hook ◀─ spawn
//! ```

use crate::config::SupervisorConfig;
use crate::dev::debouncer::{NotifyOutcome, RestartDebouncer, TimerOutcome};
use crate::dev::process::{ChildCommand, ExitOutcome, Launcher, ManagedProcess, ProcessId, Termination};
use crate::dev::state::RefreshHub;
use crate::dev::SupervisorEvent;
use crate::error::{CliError, Result};
use crate::ui;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub struct Supervisor<L: Launcher> {
    config: SupervisorConfig,
    command: ChildCommand,
    launcher: L,
    hub: Option<Arc<RefreshHub>>,
    debouncer: RestartDebouncer,
    /// The authoritative child
    current: Option<ManagedProcess>,
    /// Superseded children that have not reported their exit yet
    retired: HashMap<ProcessId, ManagedProcess>,
    next_id: u64,
    shutting_down: bool,
    events_tx: mpsc::UnboundedSender<SupervisorEvent>,
    events_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(config: SupervisorConfig, launcher: L, hub: Option<Arc<RefreshHub>>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let command = ChildCommand::from_config(&config);

        Self {
            config,
            command,
            launcher,
            hub,
            debouncer: RestartDebouncer::new(),
            current: None,
            retired: HashMap::new(),
            next_id: 0,
            shutting_down: false,
            events_tx,
            events_rx,
        }
    }

    /// Sender for the watcher and the signal listener.
    pub fn events_sender(&self) -> mpsc::UnboundedSender<SupervisorEvent> {
        self.events_tx.clone()
    }

    /// Spawn the child and supervise it until the supervisor should end.
    ///
    /// # Returns
    ///
    /// The outcome the supervisor must exit with: the current child's own
    /// exit, or `Code(0)` after a development-mode shutdown.
    ///
    /// # Errors
    ///
    /// Returns error if a child cannot be spawned or waited on.
    pub async fn run(mut self) -> Result<ExitOutcome> {
        let result = self.event_loop().await;

        // Nothing may outlive the supervisor
        self.terminate_tracked(Termination::Hard);
        self.reap_tracked().await;

        result
    }

    async fn event_loop(&mut self) -> Result<ExitOutcome> {
        self.spawn_child()?;

        loop {
            let Some(event) = self.events_rx.recv().await else {
                return Ok(ExitOutcome::Code(0));
            };

            if let Some(outcome) = self.handle_event(event)? {
                return Ok(outcome);
            }
        }
    }

    fn handle_event(&mut self, event: SupervisorEvent) -> Result<Option<ExitOutcome>> {
        match event {
            SupervisorEvent::FileChanged(path) => {
                self.on_file_changed(&path);
                Ok(None)
            }
            SupervisorEvent::DebounceElapsed => {
                self.on_debounce_elapsed();
                Ok(None)
            }
            SupervisorEvent::GraceElapsed => {
                self.on_grace_elapsed()?;
                Ok(None)
            }
            SupervisorEvent::ProcessExited { id, outcome } => {
                if !self.is_current(id) {
                    self.forget_stale(id);
                    return Ok(None);
                }

                tracing::debug!("child {} ended with {}", id, outcome);
                if !self.shutting_down && outcome != ExitOutcome::Code(0) {
                    ui::error(&format!("{} stopped with {}", self.config.command, outcome));
                }
                self.current = None;
                Ok(Some(outcome))
            }
            SupervisorEvent::ProcessFailed { id, error } => {
                if !self.is_current(id) {
                    self.forget_stale(id);
                    return Ok(None);
                }

                self.current = None;
                Err(CliError::Spawn {
                    command: self.config.command.clone(),
                    source: error,
                })
            }
            SupervisorEvent::EscalateKill { id } => {
                if let Some(child) = self.current.as_mut().filter(|c| c.id == id && c.is_alive()) {
                    tracing::debug!("child {} ignored the termination request, killing", id);
                    child.terminate(Termination::Hard);
                }
                Ok(None)
            }
            SupervisorEvent::Shutdown(signal) => Ok(self.on_shutdown(signal)),
        }
    }

    fn on_file_changed(&mut self, path: &Path) {
        if self.shutting_down {
            return;
        }

        match self.debouncer.notify(path) {
            NotifyOutcome::Ignored => tracing::debug!("ignoring change to {}", path.display()),
            NotifyOutcome::Armed => {
                tracing::debug!("change to {}, restart scheduled", path.display());
                self.schedule(self.config.restart_debounce, SupervisorEvent::DebounceElapsed);
            }
            NotifyOutcome::Coalesced => {
                tracing::debug!("change to {} folded into pending restart", path.display());
            }
        }
    }

    /// Restart step 1: kill the current child and leave the slot empty for
    /// the grace delay.
    fn on_debounce_elapsed(&mut self) {
        if self.shutting_down {
            return;
        }

        let trigger = match self.debouncer.on_timer_elapsed() {
            TimerOutcome::Restart(trigger) => trigger,
            TimerOutcome::Deferred => {
                tracing::debug!("restart already in progress, deferring");
                return;
            }
        };

        ui::clear_screen();
        ui::info(&format!("Restarting after change to {}", trigger.display()));

        if let Some(mut child) = self.current.take() {
            child.terminate(Termination::Hard);
            self.retired.insert(child.id, child);
        }

        self.schedule(self.config.grace_delay, SupervisorEvent::GraceElapsed);
    }

    /// Restart step 2: spawn the replacement and close the restart.
    fn on_grace_elapsed(&mut self) -> Result<()> {
        if self.shutting_down {
            return Ok(());
        }

        self.spawn_child()?;

        if self.debouncer.restart_finished() {
            self.schedule(self.config.restart_debounce, SupervisorEvent::DebounceElapsed);
        }
        Ok(())
    }

    fn on_shutdown(&mut self, signal: &str) -> Option<ExitOutcome> {
        let repeated = self.shutting_down;
        self.shutting_down = true;
        tracing::debug!("received {}, stopping", signal);

        if self.config.is_development {
            self.terminate_tracked(Termination::Hard);
            return Some(ExitOutcome::Code(0));
        }

        // A second signal does not wait for the escalation
        let how = if repeated {
            Termination::Hard
        } else {
            Termination::Graceful
        };

        for child in self.retired.values_mut() {
            child.terminate(Termination::Hard);
        }

        match self.current.as_mut() {
            Some(child) => {
                child.terminate(how);
                let id = child.id;
                self.schedule(self.config.escalation_delay, SupervisorEvent::EscalateKill { id });
                None
            }
            // Killed for a restart and not respawned yet
            None => Some(ExitOutcome::Code(0)),
        }
    }

    fn spawn_child(&mut self) -> Result<()> {
        self.next_id += 1;
        let id = ProcessId(self.next_id);

        let child = self.launcher.launch(id, &self.command, self.events_tx.clone())?;
        self.current = Some(child);

        if let Some(hub) = &self.hub {
            hub.on_child_spawned(self.config.refresh_delay);
        }
        Ok(())
    }

    fn is_current(&self, id: ProcessId) -> bool {
        self.current.as_ref().is_some_and(|c| c.id == id)
    }

    fn forget_stale(&mut self, id: ProcessId) {
        if self.retired.remove(&id).is_some() {
            tracing::debug!("superseded child {} exited", id);
        }
    }

    fn terminate_tracked(&mut self, how: Termination) {
        for child in self.current.iter_mut().chain(self.retired.values_mut()) {
            child.terminate(how);
        }
    }

    /// Wait, bounded by the escalation delay, for killed children to report.
    async fn reap_tracked(&mut self) {
        if let Some(child) = self.current.take() {
            self.retired.insert(child.id, child);
        }

        let deadline = Instant::now() + self.config.escalation_delay;

        while !self.retired.is_empty() {
            match tokio::time::timeout_at(deadline, self.events_rx.recv()).await {
                Ok(Some(SupervisorEvent::ProcessExited { id, .. }))
                | Ok(Some(SupervisorEvent::ProcessFailed { id, .. })) => {
                    self.retired.remove(&id);
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
    }

    fn schedule(&self, delay: Duration, event: SupervisorEvent) {
        let deadline = Instant::now() + delay;
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = tx.send(event);
        });
    }
}
