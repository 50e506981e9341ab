//! Logging infrastructure for the Jopin supervisor.
//!
//! Structured diagnostics go through the `tracing` ecosystem. User-facing
//! status lines (restart notices, warnings) are printed by [`crate::ui`] and
//! are not affected by the filter configured here.
//!
//! # Verbosity
//!
//! - `--verbose` or `JOPI_LOG=1`: debug level for the supervisor
//! - `--quiet`: errors only
//! - otherwise `RUST_LOG`, falling back to info
//!
//! # Example
//!
//! ```rust,no_run
//! use jopin_cli::logger::init_logger;
//! use tracing::debug;
//!
//! init_logger(false, false, false);
//! debug!("spawning child");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used by `--verbose`.
const VERBOSE_FILTER: &str = "jopin=debug,jopin_cli=debug";

/// Filter used by `--quiet`.
const QUIET_FILTER: &str = "jopin=error,jopin_cli=error";

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "jopin=info,jopin_cli=info";

/// Initialize the tracing subscriber with the specified options.
///
/// Must be called once, before the supervisor starts.
///
/// # Arguments
///
/// * `verbose` - Enable debug-level logging (overrides `quiet`)
/// * `quiet` - Only show error-level logs
/// * `no_color` - Disable colored output
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Whether the legacy `JOPI_LOG=1` switch asks for verbose output.
pub fn verbose_from_env() -> bool {
    std::env::var("JOPI_LOG").is_ok_and(|v| v == "1")
}
