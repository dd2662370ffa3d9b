//! A single threaded readiness multiplexer. The core of the library is
//! [`Poller`], which waits on many file descriptors at once and dispatches the
//! readiness events to per descriptor handlers, called [channels].
//!
//! [channels]: Channel
//!
//! The following system implementations back `Poller`, exactly one is compiled
//! into any build:
//!
//! | OS      | Selector |
//! |---------|----------|
//! | Android | [epoll](http://man7.org/linux/man-pages/man7/epoll.7.html) |
//! | FreeBSD | [kqueue](https://www.freebsd.org/cgi/man.cgi?query=kqueue) |
//! | Linux   | [epoll](http://man7.org/linux/man-pages/man7/epoll.7.html) |
//! | Mac OS  | [kqueue](https://developer.apple.com/legacy/library/documentation/Darwin/Reference/ManPages/man2/kqueue.2.html) |
//! | NetBSD  | [kqueue](http://netbsd.gw.com/cgi-bin/man-cgi?kqueue) |
//! | OpenBSD | [kqueue](https://man.openbsd.org/kqueue) |
//!
//! # Usage
//!
//! Using the library starts by creating a [`Poller`] and adding one or more
//! [`Channel`]s to it. Next the poller is driven by calling
//! [`Poller::loop_once`] in a loop, each call blocks until at least one channel
//! is ready (or the timeout expires) and then invokes the matching callback of
//! every ready channel.
//!
//! Callbacks receive the poller, so a channel can change its interests, remove
//! itself or remove other channels while a batch of events is being
//! dispatched. A channel that is removed is never invoked again, not even for
//! events that were already collected in the current batch.
//!
//! # Errors
//!
//! Failing system calls (except an interrupted wait) and impossible readiness
//! combinations are not recoverable. They are reported to the poller's
//! [`Diagnostics`] sink, which by default logs the error and aborts the
//! process.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::cell::RefCell;
//! use std::io::{Read, Write};
//! use std::os::unix::io::{AsRawFd, RawFd};
//! use std::os::unix::net::UnixStream;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use reactor_poller::{Channel, Interests, Poller, Token};
//!
//! struct Echo {
//!     stream: UnixStream,
//!     received: Vec<u8>,
//! }
//!
//! impl Channel for Echo {
//!     fn id(&self) -> u64 { 1 }
//!     fn fd(&self) -> RawFd { self.stream.as_raw_fd() }
//!     fn interests(&self) -> Interests { Interests::READABLE }
//!
//!     fn handle_read(&mut self, poller: &mut Poller, token: Token) {
//!         let mut buf = [0; 64];
//!         let n = self.stream.read(&mut buf).unwrap();
//!         self.received.extend_from_slice(&buf[..n]);
//!         // We're done after the first read.
//!         self.close(poller, token);
//!     }
//!
//!     fn handle_write(&mut self, _: &mut Poller, _: Token) {}
//!
//!     fn close(&mut self, poller: &mut Poller, token: Token) {
//!         poller.remove_channel(token);
//!     }
//! }
//!
//! let (stream, mut peer) = UnixStream::pair()?;
//! stream.set_nonblocking(true)?;
//! let echo = Rc::new(RefCell::new(Echo { stream, received: Vec::new() }));
//!
//! let mut poller = Poller::new();
//! poller.add_channel(&echo);
//!
//! peer.write_all(b"Hello world")?;
//! poller.loop_once(Some(Duration::from_secs(1)));
//!
//! assert_eq!(echo.borrow().received, b"Hello world");
//! assert!(poller.is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(anonymous_parameters,
        bare_trait_objects,
        missing_debug_implementations,
        missing_docs,
        trivial_casts,
        trivial_numeric_casts,
        unused_extern_crates,
        unused_import_braces,
        unused_qualifications,
)]

// Disallow warnings in examples, we want to set a good example after all.
#![doc(test(attr(deny(warnings))))]

mod channel;
mod diagnostics;
mod error;
mod interests;
mod poller;
mod sys;

pub mod dispatch;

pub use crate::channel::{Channel, Token};
pub use crate::diagnostics::{Diagnostics, FatalPolicy, LogDiagnostics};
pub use crate::error::Error;
pub use crate::interests::Interests;
pub use crate::poller::{Poller, MAX_EVENTS};

/// Name of the system selector backing [`Poller`] in this build, either
/// `"epoll"` or `"kqueue"`.
pub const BACKEND: &str = sys::NAME;

/// Create a new [`Poller`] backed by the platform's selector, reporting fatal
/// errors to the default [`LogDiagnostics`] sink.
///
/// This is the same as [`Poller::new`].
pub fn create_poller() -> Poller {
    Poller::new()
}
