//! Jopin - development loop supervisor for JavaScript servers.
//!
//! Jopin launches a runtime (Node.js, Bun or any executable), watches the
//! project sources and restarts the server after each edit. Browser pages
//! served by the child are told to reload through a local WebSocket channel
//! once the new instance is up.
//!
//! # Architecture
//!
//! - [`cli`] - Argument parsing and watch-flag stripping
//! - [`config`] - Launch settings from package.json, environment and flags
//! - [`dev`] - Process handle, debouncer, watcher, refresh channel, supervisor
//! - [`commands`] - The `run` orchestration
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Status lines on stderr
//!
//! # Example
//!
//! ```rust,no_run
//! use jopin_cli::{commands, dev, error::Result, logger};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     let args = vec!["server.js".to_string()];
//!     let outcome = commands::run_execute("node", &args).await?;
//!     dev::terminate_like(outcome)
//! }
//! ```

// Public modules
pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

// Re-export commonly used types
pub use error::{CliError, ConfigError, Result, ResultExt};
