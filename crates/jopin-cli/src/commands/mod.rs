//! Command implementations for the Jopin CLI.
//!
//! Jopin has a single command: [`run`] launches the runtime under the
//! supervisor. It takes the parsed engine and arguments and returns the
//! outcome the process should end with.

pub mod run;

pub use run::execute as run_execute;
