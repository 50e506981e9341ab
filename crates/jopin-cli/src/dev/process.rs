//! Child process handle.
//!
//! A [`ManagedProcess`] is owned by the supervisor. The OS child itself lives
//! in a monitor task which applies termination requests and reports the exit
//! back as a [`SupervisorEvent`] tagged with the [`ProcessId`] it was spawned
//! under, so events from superseded children can be told apart by identity.

use crate::config::SupervisorConfig;
use crate::dev::SupervisorEvent;
use crate::error::{CliError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Identity of one spawned child. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a child should be stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Ask politely (SIGTERM on Unix)
    Graceful,
    /// Kill unconditionally
    Hard,
}

/// How a child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with a status code
    Code(i32),
    /// Killed by a signal
    Signal(i32),
}

impl ExitOutcome {
    /// Convert an OS exit status.
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitOutcome::Signal(signal);
            }
        }

        ExitOutcome::Code(status.code().unwrap_or(1))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(code) => write!(f, "exit code {}", code),
            ExitOutcome::Signal(signal) => write!(f, "signal {}", signal),
        }
    }
}

/// Fully resolved command line for one spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

impl ChildCommand {
    /// Build the command for `config`, going through a shell for script
    /// launchers (`.cmd`, `.bat`, `.sh`).
    pub fn from_config(config: &SupervisorConfig) -> Self {
        let (program, args) = match script_kind(&config.command) {
            Some(ScriptKind::Batch) => (
                "cmd".to_string(),
                vec![
                    "/C".to_string(),
                    join_command_line(&config.command, &config.arguments, quote_batch),
                ],
            ),
            Some(ScriptKind::Posix) => (
                "sh".to_string(),
                vec![
                    "-c".to_string(),
                    join_command_line(&config.command, &config.arguments, quote_posix),
                ],
            ),
            None => (config.command.clone(), config.arguments.clone()),
        };

        Self {
            program,
            args,
            env: config.environment.clone(),
            cwd: config.cwd.clone(),
        }
    }

    /// Human readable form for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptKind {
    Batch,
    Posix,
}

fn script_kind(command: &str) -> Option<ScriptKind> {
    let ext = Path::new(command)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;

    match ext.as_str() {
        "cmd" | "bat" => Some(ScriptKind::Batch),
        "sh" => Some(ScriptKind::Posix),
        _ => None,
    }
}

fn join_command_line(command: &str, args: &[String], quote: fn(&str) -> String) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_posix(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn quote_batch(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\"\""))
    }
}

/// The supervisor's view of a spawned child.
#[derive(Debug)]
pub struct ManagedProcess {
    pub id: ProcessId,
    /// OS process id, when the platform reports one
    pub pid: Option<u32>,
    /// A termination request has been sent
    pub killed: bool,
    pub started_at: Instant,
    control: mpsc::UnboundedSender<Termination>,
}

impl ManagedProcess {
    /// Wrap a child whose monitor listens on `control`.
    pub fn new(id: ProcessId, pid: Option<u32>, control: mpsc::UnboundedSender<Termination>) -> Self {
        Self {
            id,
            pid,
            killed: false,
            started_at: Instant::now(),
            control,
        }
    }

    /// Request termination. Idempotent: a child that is already gone is not
    /// an error.
    pub fn terminate(&mut self, how: Termination) {
        self.killed = true;
        let _ = self.control.send(how);
    }

    /// Whether the monitor task is still tracking the OS process.
    pub fn is_alive(&self) -> bool {
        !self.control.is_closed()
    }
}

/// Starts children for the supervisor.
pub trait Launcher {
    /// Spawn `command` as child `id`. Its exit must be reported on `events`
    /// exactly once, as `ProcessExited` or `ProcessFailed`.
    fn launch(
        &self,
        id: ProcessId,
        command: &ChildCommand,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Result<ManagedProcess>;
}

/// Launcher backed by real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(
        &self,
        id: ProcessId,
        command: &ChildCommand,
        events: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Result<ManagedProcess> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .env_clear()
            .envs(&command.env)
            .current_dir(&command.cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| CliError::Spawn {
            command: command.program.clone(),
            source,
        })?;

        let pid = child.id();
        tracing::debug!("spawned child {} (pid {:?}): {}", id, pid, command.display());

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        tokio::spawn(monitor(id, child, control_rx, events));

        Ok(ManagedProcess::new(id, pid, control_tx))
    }
}

/// Own the child until it exits, applying termination requests meanwhile.
async fn monitor(
    id: ProcessId,
    mut child: Child,
    mut control: mpsc::UnboundedReceiver<Termination>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(how) = control.recv() => apply_termination(&mut child, how),
        }
    };

    let event = match status {
        Ok(status) => SupervisorEvent::ProcessExited {
            id,
            outcome: ExitOutcome::from_status(status),
        },
        Err(error) => SupervisorEvent::ProcessFailed { id, error },
    };

    let _ = events.send(event);
}

fn apply_termination(child: &mut Child, how: Termination) {
    match how {
        Termination::Graceful => send_graceful(child),
        Termination::Hard => {
            if let Err(e) = child.start_kill() {
                tracing::debug!("hard kill ignored: {}", e);
            }
        }
    }
}

#[cfg(unix)]
fn send_graceful(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => {}
        Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::debug!("SIGTERM to {} failed: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn send_graceful(child: &mut Child) {
    let _ = child.start_kill();
}
