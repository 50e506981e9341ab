//! Error handling for the Jopin supervisor.
//!
//! This module provides a small error hierarchy built on `thiserror`. Each
//! variant is written to be actionable: fatal conditions print the underlying
//! cause together with a hint about what to change.
//!
//! # Architecture
//!
//! - **Top-level errors** (`CliError`) represent broad categories of failures
//! - **Domain-specific errors** (`ConfigError`) provide detailed context
//! - **Error conversion** is automatic via `#[from]` attributes
//! - **Context helpers** allow attaching additional information to errors
//!
//! # Example
//!
//! ```rust,no_run
//! use jopin_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).context(format!("Cannot read {}", path.display()))
//! }
//! ```

mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (invalid values, unreadable manifest)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors from file system or process operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The child process could not be started
    #[error("Failed to start '{command}': {source}\n\nHint: Check that the runtime is installed and on your PATH")]
    Spawn {
        /// Program that was executed
        command: String,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// The explicitly requested notification port could not be bound
    #[error("Cannot open the browser refresh channel on port {port}: {source}\n\nHint: Free port {port} or unset JOPIN_WEBSOCKET_PORT")]
    ChannelBind {
        /// Port forced through the environment
        port: u16,
        /// Underlying bind error
        source: std::io::Error,
    },

    /// The notification channel server stopped unexpectedly
    #[error("Refresh channel error: {0}")]
    Channel(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// package.json could not be parsed into the expected shape
    #[error("Invalid package.json at {}: {message}\n\nHint: Check the \"jopi\" section field types", .path.display())]
    InvalidManifest {
        /// Location of the manifest
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Prefix the error with a custom message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_bind_mentions_port() {
        let err = CliError::ChannelBind {
            port: 5123,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("5123"));
        assert!(msg.contains("address in use"));
        assert!(msg.contains("Hint:"));
    }

    #[test]
    fn test_spawn_error_includes_command_and_cause() {
        let err = CliError::Spawn {
            command: "node".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("'node'"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "WATCH".to_string(),
            value: "maybe".to_string(),
            hint: "Use 0, 1 or hot".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid value for 'WATCH'"));
        assert!(msg.contains("maybe"));
    }

    #[test]
    fn test_cli_error_from_config_error() {
        let config_err = ConfigError::InvalidValue {
            field: "JOPIN_WEBSOCKET_PORT".to_string(),
            value: "abc".to_string(),
            hint: "Use a port number".to_string(),
        };
        let cli_err: CliError = config_err.into();
        assert!(matches!(cli_err, CliError::Config(_)));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::io::Result<()> = Err(std::io::Error::other("denied"));

        let err = result.context("Failed to watch /proj/src").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to watch /proj/src"));
        assert!(msg.contains("denied"));
    }
}
