//! Miette diagnostic conversion for CLI errors.
//!
//! This module provides conversion from CLI errors to miette diagnostics
//! for readable fatal-error reporting.

use crate::error::CliError;
use ::miette::Report;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => ::miette::miette!("Configuration error: {}", e),
        CliError::Spawn { command, source } => ::miette::miette!(
            help = "Check that the runtime is installed and on your PATH",
            "Failed to start '{}': {}",
            command,
            source
        ),
        CliError::ChannelBind { port, source } => ::miette::miette!(
            help = format!("Free port {} or unset JOPIN_WEBSOCKET_PORT", port),
            "Cannot open the browser refresh channel on port {}: {}",
            port,
            source
        ),
        _ => ::miette::miette!("{}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_report_keeps_port() {
        let report = cli_error_to_miette(CliError::ChannelBind {
            port: 5123,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        });
        assert!(report.to_string().contains("5123"));
    }
}
