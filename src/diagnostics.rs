use std::fmt;
use std::panic::Location;
use std::process;

use log::{Level, Record};

use crate::Error;

/// Sink for unrecoverable errors.
///
/// Every failure the [`Poller`] can't recover from is passed to
/// [`Diagnostics::fatal`], which must not return. The default sink is
/// [`LogDiagnostics`], tests can substitute their own sink to capture the
/// error instead of terminating the process.
///
/// [`Poller`]: crate::Poller
pub trait Diagnostics: fmt::Debug {
    /// Report `err`, which occurred at `location`, and diverge.
    fn fatal(&self, location: &'static Location<'static>, err: &Error) -> !;
}

/// What [`LogDiagnostics`] does after logging a fatal error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FatalPolicy {
    /// Abort the process.
    Abort,
    /// Panic with the error message.
    Panic,
}

impl Default for FatalPolicy {
    fn default() -> FatalPolicy {
        FatalPolicy::Abort
    }
}

/// [`Diagnostics`] implementation using the [`log`] crate.
///
/// The error is logged at error level, with the file and line of where it
/// occurred, after which the [`FatalPolicy`] is applied.
///
/// [`log`]: https://docs.rs/log
#[derive(Debug, Default)]
pub struct LogDiagnostics {
    policy: FatalPolicy,
}

impl LogDiagnostics {
    /// Create a new sink with the provided `policy`.
    pub const fn new(policy: FatalPolicy) -> LogDiagnostics {
        LogDiagnostics { policy }
    }

    /// Returns the policy applied after logging.
    pub fn policy(&self) -> FatalPolicy {
        self.policy
    }
}

impl Diagnostics for LogDiagnostics {
    fn fatal(&self, location: &'static Location<'static>, err: &Error) -> ! {
        log::logger().log(&Record::builder()
            .args(format_args!("{}", err))
            .level(Level::Error)
            .target(module_path!())
            .file(Some(location.file()))
            .line(Some(location.line()))
            .build());

        match self.policy {
            FatalPolicy::Abort => {
                log::logger().flush();
                process::abort()
            },
            FatalPolicy::Panic => panic!("fatal error at {}: {}", location, err),
        }
    }
}
