//! Exit status propagation.
//!
//! The supervisor ends the way its child ended: with the same exit code, or
//! killed by the same signal.

use crate::dev::process::ExitOutcome;

/// Exit status a shell reports for `outcome`.
pub fn exit_code(outcome: ExitOutcome) -> i32 {
    match outcome {
        ExitOutcome::Code(code) => code,
        ExitOutcome::Signal(signal) => 128 + signal,
    }
}

/// End the current process like a child that ended with `outcome`.
///
/// Signals are re-raised with their default disposition restored; when that
/// does not terminate the process the shell convention `128 + signal` is
/// used instead.
pub fn terminate_like(outcome: ExitOutcome) -> ! {
    #[cfg(unix)]
    if let ExitOutcome::Signal(signal) = outcome {
        reraise(signal);
    }

    std::process::exit(exit_code(outcome))
}

#[cfg(unix)]
fn reraise(signo: i32) {
    use nix::sys::signal::{SigHandler, Signal, raise, signal};

    let Ok(sig) = Signal::try_from(signo) else {
        return;
    };

    // SAFETY: restoring the default disposition installs no Rust handler.
    if let Err(e) = unsafe { signal(sig, SigHandler::SigDfl) } {
        tracing::debug!("cannot reset {:?}: {}", sig, e);
    }

    if let Err(e) = raise(sig) {
        tracing::debug!("cannot raise {:?}: {}", sig, e);
    }
}
