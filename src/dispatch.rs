//! Rules mapping a readiness record to a channel callback.
//!
//! Each selector reports readiness differently, these functions encode which
//! callback a record leads to. They're independent of the platform's types so
//! both rule sets are available, and tested, on every platform.

/// The channel callback a readiness record leads to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Callback {
    /// [`Channel::handle_read`](crate::Channel::handle_read).
    Read,
    /// [`Channel::handle_write`](crate::Channel::handle_write).
    Write,
}

/// Callback for an epoll record.
///
/// Errors and hang-ups are reported through the read callback, the read
/// handler is responsible for retrieving the error. This also means that a
/// record that is both readable and writable only invokes the read callback,
/// the write readiness will be reported again on the next wait.
///
/// Returns `None` if the record has no known readiness.
pub fn epoll_callback(readable: bool, error: bool, hup: bool, writable: bool) -> Option<Callback> {
    if readable || error || hup {
        Some(Callback::Read)
    } else if writable {
        Some(Callback::Write)
    } else {
        None
    }
}

/// Callback for a kqueue record.
///
/// Kqueue reports read and write filters as separate records, so the record
/// itself doesn't say much. Instead the channel's current interests decide:
/// unless the descriptor reached end-of-file the write callback is preferred
/// when write interest is enabled. End-of-file always goes to the read
/// callback so the handler can observe the close.
///
/// Returns `None` if the record is not end-of-file and the channel has no
/// interests.
pub fn kqueue_callback(eof: bool, read_enabled: bool, write_enabled: bool) -> Option<Callback> {
    if !eof && write_enabled {
        Some(Callback::Write)
    } else if eof || read_enabled {
        Some(Callback::Read)
    } else {
        None
    }
}
