use std::cmp::min;
use std::os::unix::io::RawFd;
use std::time::Duration;
use std::{fmt, io, ptr};

use log::error;

use crate::channel::INVALID_TOKEN;
use crate::dispatch::{self, Callback};
use crate::poller::MAX_EVENTS;
use crate::{Error, Interests, Token};

pub const NAME: &str = "epoll";

pub struct Selector {
    epfd: RawFd,
    /// Records of the last `select` call, reused by every call.
    events: Box<[libc::epoll_event]>,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd == -1 {
            Err(io::Error::last_os_error())
        } else {
            let events = vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];
            Ok(Selector { epfd, events: events.into_boxed_slice() })
        }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }

    pub fn select(&mut self, timeout: Option<Duration>) -> Result<usize, Error> {
        let timeout_ms = timeout.map(duration_to_millis).unwrap_or(-1);

        let n_events = unsafe {
            libc::epoll_wait(self.epfd, self.events.as_mut_ptr(),
                self.events.len() as libc::c_int, timeout_ms)
        };
        match n_events {
            -1 => {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    // Interrupted by a signal, same as no events.
                    Some(libc::EINTR) => Ok(0),
                    _ => Err(Error::Syscall { call: "epoll_wait", source: err }),
                }
            },
            n => Ok(n as usize),
        }
    }

    pub fn register(&self, fd: RawFd, token: Token, interests: Interests) -> Result<(), Error> {
        let mut epoll_event = new_epoll_event(interests, token);
        epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut epoll_event)
            .map_err(|source| Error::Syscall { call: "epoll_ctl add", source })
    }

    pub fn reregister(&self, fd: RawFd, token: Token, interests: Interests) -> Result<(), Error> {
        let mut epoll_event = new_epoll_event(interests, token);
        epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut epoll_event)
            .map_err(|source| Error::Syscall { call: "epoll_ctl mod", source })
    }

    pub fn deregister(&self, fd: RawFd) -> Result<(), Error> {
        match epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, ptr::null_mut()) {
            Ok(()) => Ok(()),
            // Closing the descriptor already removed it from the epoll set.
            Err(ref err) if matches!(err.raw_os_error(), Some(libc::ENOENT) | Some(libc::EBADF)) => Ok(()),
            Err(source) => Err(Error::Syscall { call: "epoll_ctl del", source }),
        }
    }

    /// The token of record `index`, `None` if the record was invalidated.
    pub fn token(&self, index: usize) -> Option<Token> {
        let data = self.events[index].u64;
        if data == INVALID_TOKEN.0 as u64 {
            None
        } else {
            Some(Token(data as usize))
        }
    }

    /// Invalidate all records in `0..end` for `token`. Returns the number of
    /// records invalidated.
    pub fn invalidate(&mut self, end: usize, token: Token) -> usize {
        let mut invalidated = 0;
        for event in self.events[..end].iter_mut().rev() {
            let data = event.u64;
            if data == token.0 as u64 {
                event.u64 = INVALID_TOKEN.0 as u64;
                invalidated += 1;
            }
        }
        invalidated
    }

    /// The callback for record `index`. The interests of the channel are not
    /// used, epoll only reports what was registered.
    pub fn callback(&self, index: usize, _: bool, _: bool) -> Option<Callback> {
        let epoll = self.events[index].events;
        dispatch::epoll_callback(
            contains_flag(epoll, libc::EPOLLIN),
            contains_flag(epoll, libc::EPOLLERR),
            contains_flag(epoll, libc::EPOLLHUP),
            contains_flag(epoll, libc::EPOLLOUT),
        )
    }

    /// Raw flags of record `index`, used in diagnostics.
    pub fn flags(&self, index: usize) -> u32 {
        self.events[index].events
    }
}

const MILLIS_PER_SEC: u64 = 1_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// Convert a `Duration` to milliseconds, rounding up so we don't wake up before
/// the timeout expired.
pub fn duration_to_millis(duration: Duration) -> libc::c_int {
    let mut millis = duration.as_secs().saturating_mul(MILLIS_PER_SEC)
        .saturating_add(u64::from(duration.subsec_nanos() / NANOS_PER_MILLI));
    if duration.subsec_nanos() % NANOS_PER_MILLI != 0 {
        millis = millis.saturating_add(1);
    }
    min(millis, libc::c_int::max_value() as u64) as libc::c_int
}

/// Whether or not the provided `flags` contains the provided `flag`.
fn contains_flag(flags: u32, flag: libc::c_int) -> bool {
    (flags & flag as u32) != 0
}

/// Create a new `epoll_event`.
fn new_epoll_event(interests: Interests, token: Token) -> libc::epoll_event {
    libc::epoll_event {
        events: to_epoll_events(interests),
        u64: token.0 as u64,
    }
}

// NOTE: level triggered, `EPOLLERR` and `EPOLLHUP` are always reported.
fn to_epoll_events(interests: Interests) -> u32 {
    let mut events = 0;

    if interests.is_readable() {
        events |= libc::EPOLLIN;
    }

    if interests.is_writable() {
        events |= libc::EPOLLOUT;
    }

    events as u32
}

fn epoll_ctl(epfd: RawFd, op: libc::c_int, fd: RawFd, event: *mut libc::epoll_event) -> io::Result<()> {
    if unsafe { libc::epoll_ctl(epfd, op, fd, event) } == -1 {
        // Possible errors:
        // EBADF, EEXIST, ENOENT, EPERM: user error.
        // EINVAL, ELOOP: shouldn't happen.
        // ENOMEM, ENOSPC: can't handle.
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("epfd", &self.epfd)
            .finish()
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        if unsafe { libc::close(self.epfd) } == -1 {
            // Possible errors:
            // - EBADF, EIO: can't recover.
            // - EINTR: could try again but we're can't be sure if the file
            //          descriptor was closed or not, so to be safe we don't
            //          close it again.
            let err = io::Error::last_os_error();
            error!("error closing epoll: {}", err);
        }
    }
}
