//! The readiness multiplexer.

use std::cell::RefCell;
use std::os::unix::io::{AsRawFd, RawFd};
use std::panic::Location;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use log::{info, trace, warn};
use slab::Slab;

use crate::dispatch::Callback;
use crate::{sys, Channel, Diagnostics, Error, Interests, LogDiagnostics, Token};

/// Capacity of the readiness buffer, the maximum number of records a single
/// call to [`Poller::loop_once`] can dispatch.
pub const MAX_EVENTS: usize = 2000;

/// Readiness multiplexer backed by epoll or kqueue.
///
/// The poller keeps a registry of [`Channel`]s, each registered with the
/// system selector for its current interests. Calling [`loop_once`] waits for
/// readiness and invokes the callbacks of the ready channels.
///
/// A poller must only be used by the thread that created it, hence it's
/// neither `Send` nor `Sync`.
///
/// # Removal while dispatching
///
/// The records of a single wait are collected before any callback is invoked.
/// When a channel is removed, from within a callback or not, all records of the
/// current batch that are not yet dispatched and belong to the channel are
/// invalidated. A removed channel is never invoked again.
///
/// # Dropping
///
/// Dropping the poller calls [`Channel::close`] on every channel that is still
/// registered, before releasing the system selector.
///
/// [`loop_once`]: Poller::loop_once
#[derive(Debug)]
pub struct Poller {
    selector: sys::Selector,
    /// Registered channels, the live set.
    channels: Slab<Entry>,
    /// Records of the current batch that are not yet dispatched, `0..cursor`.
    cursor: usize,
    diagnostics: Box<dyn Diagnostics>,
}

#[derive(Debug)]
struct Entry {
    channel: Weak<RefCell<dyn Channel>>,
    id: u64,
    fd: RawFd,
}

impl Poller {
    /// Create a new poller which reports fatal errors to the default
    /// [`LogDiagnostics`] sink, aborting the process.
    pub fn new() -> Poller {
        Poller::with_diagnostics(Box::new(LogDiagnostics::default()))
    }

    /// Create a new poller which reports fatal errors to `diagnostics`.
    #[track_caller]
    pub fn with_diagnostics(diagnostics: Box<dyn Diagnostics>) -> Poller {
        let selector = match sys::Selector::new() {
            Ok(selector) => selector,
            Err(source) => {
                let err = Error::Syscall { call: sys::NAME, source };
                diagnostics.fatal(Location::caller(), &err)
            },
        };
        info!("poller {} {} created", sys::NAME, selector.as_raw_fd());
        Poller { selector, channels: Slab::new(), cursor: 0, diagnostics }
    }

    /// Register `channel` for its current interests.
    ///
    /// The returned token identifies the channel within this poller until it
    /// is removed, it's passed to every callback of the channel.
    ///
    /// # Panics
    ///
    /// `channel` is borrowed to read its descriptor and interests, it can't be
    /// mutably borrowed at the same time. The system registration failing is
    /// fatal.
    #[track_caller]
    pub fn add_channel<C>(&mut self, channel: &Rc<RefCell<C>>) -> Token
        where C: Channel + 'static,
    {
        let rc: Rc<RefCell<dyn Channel>> = channel.clone();
        let (id, fd, interests) = {
            let ch = rc.borrow();
            (ch.id(), ch.fd(), ch.interests())
        };

        let token = Token(self.channels.vacant_key());
        trace!("adding channel {} fd {} interests {:?} {} {}",
            id, fd, interests, sys::NAME, self.selector.as_raw_fd());
        if let Err(err) = self.selector.register(fd, token, interests) {
            self.fatal(err);
        }
        let key = self.channels.insert(Entry { channel: Rc::downgrade(&rc), id, fd });
        debug_assert_eq!(key, token.0);
        token
    }

    /// Synchronise the system registration with the current interests of
    /// `channel`.
    ///
    /// `channel` must be the channel registered as `token`, it's passed by
    /// reference so a channel can update itself from within its callbacks.
    /// Updating a token that's not registered is a no-op.
    #[track_caller]
    pub fn update_channel(&mut self, token: Token, channel: &dyn Channel) {
        let fd = match self.channels.get(token.0) {
            Some(entry) => entry.fd,
            None => {
                trace!("not updating unknown channel {} token {:?}", channel.id(), token);
                return;
            },
        };
        debug_assert_eq!(fd, channel.fd(), "updating channel with a different descriptor");

        trace!("modifying channel {} fd {} events read {} write {} {} {}",
            channel.id(), fd, channel.read_enabled(), channel.write_enabled(),
            sys::NAME, self.selector.as_raw_fd());
        let interests = Interests::from_flags(channel.read_enabled(), channel.write_enabled());
        if let Err(err) = self.selector.reregister(fd, token, interests) {
            self.fatal(err);
        }
    }

    /// Remove the channel registered as `token`.
    ///
    /// This removes the channel from the live set, removes the descriptor from
    /// the system selector and invalidates any pending record of the channel
    /// in the current batch. Removing a token that's not registered is a
    /// no-op.
    #[track_caller]
    pub fn remove_channel(&mut self, token: Token) {
        self.detach(token, false)
    }

    /// Remove the channel registered as `token`. If `stale` is true the channel
    /// was dropped by its owner, which may have closed its descriptor, in which
    /// case the descriptor number may already be reused by another channel.
    #[track_caller]
    fn detach(&mut self, token: Token, stale: bool) {
        let entry = match self.channels.try_remove(token.0) {
            Some(entry) => entry,
            None => {
                trace!("not removing unknown channel token {:?}", token);
                return;
            },
        };

        trace!("deleting channel {} fd {} {} {}",
            entry.id, entry.fd, sys::NAME, self.selector.as_raw_fd());
        let invalidated = self.selector.invalidate(self.cursor, token);
        if invalidated != 0 {
            trace!("invalidated {} pending records of channel {}", invalidated, entry.id);
        }

        if stale && self.channels.iter().any(|(_, other)| other.fd == entry.fd) {
            return;
        }
        if let Err(err) = self.selector.deregister(entry.fd) {
            self.fatal(err);
        }
    }

    /// Wait up to `timeout` for readiness and dispatch the ready channels.
    ///
    /// A timeout of `None` blocks until at least one channel is ready, a
    /// timeout of zero doesn't block at all. Being interrupted by a signal is
    /// the same as no channels being ready.
    ///
    /// Returns the number of callbacks invoked.
    pub fn loop_once(&mut self, timeout: Option<Duration>) -> usize {
        let start = Instant::now();
        let n_events = match self.selector.select(timeout) {
            Ok(n) => n,
            Err(err) => self.fatal(err),
        };
        trace!("{} wait {:?} returned {} events, used {:?}",
            sys::NAME, timeout, n_events, start.elapsed());

        let mut dispatched = 0;
        self.cursor = n_events;
        while self.cursor > 0 {
            self.cursor -= 1;
            let index = self.cursor;
            let token = match self.selector.token(index) {
                Some(token) => token,
                // Invalidated by a removal.
                None => continue,
            };

            let rc = match self.channels.get(token.0).map(|entry| entry.channel.upgrade()) {
                Some(Some(rc)) => rc,
                Some(None) => {
                    warn!("channel token {:?} dropped without being removed", token);
                    self.detach(token, true);
                    continue;
                },
                None => continue,
            };
            let mut channel = rc.borrow_mut();
            match self.selector.callback(index, channel.read_enabled(), channel.write_enabled()) {
                Some(Callback::Read) => {
                    trace!("channel {} fd {} handle read", channel.id(), channel.fd());
                    channel.handle_read(self, token);
                },
                Some(Callback::Write) => {
                    trace!("channel {} fd {} handle write", channel.id(), channel.fd());
                    channel.handle_write(self, token);
                },
                None => self.fatal(Error::UnexpectedReadiness {
                    id: channel.id(),
                    fd: channel.fd(),
                    flags: self.selector.flags(index),
                }),
            }
            dispatched += 1;
        }
        dispatched
    }

    /// Returns the number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if no channels are registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns true if `token` refers to a registered channel.
    pub fn contains(&self, token: Token) -> bool {
        self.channels.contains(token.0)
    }

    #[track_caller]
    fn fatal(&self, err: Error) -> ! {
        self.diagnostics.fatal(Location::caller(), &err)
    }
}

impl Default for Poller {
    fn default() -> Poller {
        Poller::new()
    }
}

impl AsRawFd for Poller {
    fn as_raw_fd(&self) -> RawFd {
        self.selector.as_raw_fd()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        info!("destroying poller {}", self.selector.as_raw_fd());
        while let Some((key, channel)) = self.channels.iter().next()
            .map(|(key, entry)| (key, entry.channel.clone()))
        {
            let token = Token(key);
            let stale = match channel.upgrade() {
                Some(rc) => {
                    if let Ok(mut channel) = rc.try_borrow_mut() {
                        channel.close(self, token);
                    }
                    false
                },
                None => true,
            };
            // The channel is gone, borrowed or didn't detach itself.
            if self.channels.contains(key) {
                self.detach(token, stale);
            }
        }
        info!("poller {} destroyed", self.selector.as_raw_fd());
    }
}
