//! Terminal output helpers.
//!
//! Status lines are printed to stderr so the child's own stdout passes
//! through the supervisor untouched.
//!
//! # Examples
//!
//! ```no_run
//! use jopin_cli::ui;
//!
//! ui::success("Source watching enabled");
//! ui::warning("package.json not found, can't enable file watching");
//! ```

mod messages;

pub use messages::{error, info, success, warning};

use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Decide once whether status lines are coloured.
///
/// Call this at startup, after parsing arguments.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}

/// Check if color output should be enabled.
///
/// Respects NO_COLOR and FORCE_COLOR environment variables, falls back to
/// terminal capability detection.
pub fn should_use_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    console::user_attended_stderr()
}

/// Clear the terminal before a restart so the new instance's output starts
/// on a clean screen. Does nothing when stderr is not a terminal.
pub fn clear_screen() {
    let term = console::Term::stderr();
    if term.is_term() {
        let _ = term.clear_screen();
    }
}
