use std::os::unix::io::RawFd;
use std::{error, fmt, io};

/// An unrecoverable error.
///
/// None of these errors are returned to the caller, they're reported to the
/// poller's [`Diagnostics`] sink, after which the process terminates (or
/// panics, depending on the sink).
///
/// [`Diagnostics`]: crate::Diagnostics
#[derive(Debug)]
pub enum Error {
    /// A system call of the selector failed.
    Syscall {
        /// Description of the failed call, e.g. `"epoll_ctl add"`.
        call: &'static str,
        /// The error returned by the system.
        source: io::Error,
    },
    /// A readiness record that none of the dispatch rules accept.
    UnexpectedReadiness {
        /// Id of the channel the record belongs to.
        id: u64,
        /// Descriptor of the channel.
        fd: RawFd,
        /// Raw flags of the record, `epoll_event.events` or `kevent.flags`.
        flags: u32,
    },
}

impl Error {
    /// The numeric OS error code, if the error was caused by a system call.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Syscall { source, .. } => source.raw_os_error(),
            Error::UnexpectedReadiness { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syscall { call, source } => match source.raw_os_error() {
                Some(code) => write!(f, "{} failed {} {}", call, code, source),
                None => write!(f, "{} failed {}", call, source),
            },
            Error::UnexpectedReadiness { id, fd, flags } =>
                write!(f, "unexpected poller events {:#x} for channel {} fd {}", flags, id, fd),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Syscall { source, .. } => Some(source),
            Error::UnexpectedReadiness { .. } => None,
        }
    }
}
