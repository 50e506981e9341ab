//! Jopin CLI - restart-on-change supervisor for JavaScript servers.
//!
//! This is the main entry point. It handles argument parsing, logging
//! initialization, and hands over to the supervisor. The process ends the
//! way the supervised child ended.

use jopin_cli::{cli, commands, dev, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = cli::Cli::parse_args();

    // Initialize logging and colors based on global flags
    let verbose = args.verbose || logger::verbose_from_env();
    logger::init_logger(verbose, args.quiet && !verbose, args.no_color);
    ui::init_colors(args.no_color);

    // Convert CLI errors to miette diagnostics for error reporting
    let outcome = commands::run_execute(&args.engine, &args.args)
        .await
        .map_err(error::cli_error_to_miette)?;

    dev::terminate_like(outcome)
}
