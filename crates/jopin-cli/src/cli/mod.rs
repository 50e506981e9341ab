//! Command-line interface definition for Jopin.
//!
//! ```text
//! jopin [OPTIONS] <ENGINE> [ARGS]...
//! ```
//!
//! Supervisor options are only recognised before `ENGINE`. Everything after it
//! is forwarded to the runtime, except the watch flags handled by
//! [`split_watch_flags`].

mod forward;

use clap::Parser;
use std::ffi::OsString;

pub use forward::{WatchFlags, split_watch_flags};

/// Jopin - run a Node.js or Bun server and restart it when sources change
#[derive(Parser, Debug)]
#[command(
    name = "jopin",
    version,
    about = "Run a JavaScript server and restart it when sources change",
    long_about = "Jopin launches a JavaScript runtime, watches the project sources and restarts\n\
                  the server after each edit. Open browser tabs are asked to reload once the\n\
                  new instance is up."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Runtime to launch (node, bun, or any executable on PATH)
    #[arg(value_name = "ENGINE")]
    pub engine: String,

    /// Arguments forwarded to the runtime
    ///
    /// `--watch`, `--hot` and `--watch-path` are consumed by the supervisor.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse the process arguments.
    pub fn parse_args() -> Self {
        Self::parse_args_from(std::env::args_os())
    }

    /// Parse an explicit argument list (first item is the binary name).
    ///
    /// Only the arguments up to and including `ENGINE` go through clap, so a
    /// forwarded `--help` or `--verbose` reaches the runtime instead of the
    /// supervisor.
    pub fn parse_args_from<I, T>(itr: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let argv: Vec<OsString> = itr.into_iter().map(Into::into).collect();

        let engine_at = argv
            .iter()
            .skip(1)
            .position(|arg| !arg.to_string_lossy().starts_with('-'))
            .map(|pos| pos + 1);

        let (head, tail) = match engine_at {
            Some(idx) => argv.split_at(idx + 1),
            None => (argv.as_slice(), &[][..]),
        };

        let mut cli = Cli::parse_from(head);
        cli.args = tail
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        cli
    }
}
