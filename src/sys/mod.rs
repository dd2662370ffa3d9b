//! Platform specific selectors.
//!
//! Each platform must provide a `Selector` type with the following API, used
//! by `Poller`:
//!
//! * `new() -> io::Result<Selector>`: create the system selector along with
//!   its readiness buffer of `MAX_EVENTS` records.
//! * `register`, `reregister` and `deregister`: synchronise the system
//!   registration of a descriptor with its interests.
//! * `select(timeout) -> Result<usize, Error>`: wait for readiness, filling
//!   the buffer. An interrupted wait returns zero records.
//! * `token(index)`, `invalidate(end, token)` and `callback(index, ..)`:
//!   access the records of the last `select` call.
//!
//! Also a `NAME` constant is expected, used in logging.

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use self::unix::*;
