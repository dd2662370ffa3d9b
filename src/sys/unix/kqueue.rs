use std::os::unix::io::RawFd;
use std::time::Duration;
use std::{cmp, fmt, io, mem, ptr};

use log::error;

use crate::channel::INVALID_TOKEN;
use crate::dispatch::{self, Callback};
use crate::poller::MAX_EVENTS;
use crate::{Error, Interests, Token};

pub const NAME: &str = "kqueue";

// Of course each OS that implements kqueue has chosen to go for different types
// in the `kevent` structure, hence the type definitions below.

// Type of `nchanges` in the `kevent` system call.
#[cfg(not(target_os = "netbsd"))]
#[allow(non_camel_case_types)]
type nchanges_t = libc::c_int;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type nchanges_t = libc::size_t;

// Type of the `filter` field in the `kevent` structure.
#[cfg(any(target_os = "freebsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_filter_t = libc::c_short;
#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
type kevent_filter_t = i16;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_filter_t = u32;

// Type of the `flags` field in the `kevent` structure.
#[cfg(any(target_os = "freebsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_flags_t = libc::c_ushort;
#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
type kevent_flags_t = u16;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_flags_t = u32;

// Type of the `data` field in the `kevent` structure.
#[cfg(any(target_os = "freebsd", target_os = "macos"))]
#[allow(non_camel_case_types)]
type kevent_data_t = libc::intptr_t;
#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_data_t = i64;

// Type of the `udata` field in the `kevent` structure.
#[cfg(any(target_os = "freebsd", target_os = "macos", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_udata_t = *mut libc::c_void;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_udata_t = libc::intptr_t;

pub struct Selector {
    kq: RawFd,
    /// Records of the last `select` call, reused by every call.
    events: Box<[libc::kevent]>,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let kq = unsafe { libc::kqueue() };
        if kq == -1 {
            return Err(io::Error::last_os_error());
        }

        if unsafe { libc::fcntl(kq, libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
            let err = io::Error::last_os_error();
            let _ = unsafe { libc::close(kq) };
            return Err(err);
        }

        let events = (0..MAX_EVENTS)
            .map(|_| new_kevent(0, libc::EVFILT_READ, 0, INVALID_TOKEN))
            .collect::<Vec<_>>();
        Ok(Selector { kq, events: events.into_boxed_slice() })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.kq
    }

    pub fn select(&mut self, timeout: Option<Duration>) -> Result<usize, Error> {
        let timespec = timeout.map(timespec_from_duration);
        #[allow(trivial_casts)]
        let timespec_ptr = timespec
            .as_ref()
            .map(|t| t as *const libc::timespec)
            .unwrap_or(ptr::null());

        let n_events = unsafe {
            libc::kevent(self.kq, ptr::null(), 0,
                self.events.as_mut_ptr(), self.events.len() as nchanges_t, timespec_ptr)
        };
        match n_events {
            -1 => {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    // Interrupted by a signal, same as no events.
                    Some(libc::EINTR) => Ok(0),
                    _ => Err(Error::Syscall { call: "kevent wait", source: err }),
                }
            },
            n => Ok(n as usize),
        }
    }

    /// Adds a filter for each enabled direction, a disabled direction is not
    /// registered at all.
    pub fn register(&self, fd: RawFd, token: Token, interests: Interests) -> Result<(), Error> {
        let flags = libc::EV_ADD | libc::EV_ENABLE | libc::EV_RECEIPT;
        // At most we need two changes, but maybe we only need 1.
        let mut changes: [libc::kevent; 2] = unsafe { mem::zeroed() };
        let mut n_changes = 0;

        if interests.is_readable() {
            changes[n_changes] = new_kevent(fd as libc::uintptr_t, libc::EVFILT_READ, flags, token);
            n_changes += 1;
        }

        if interests.is_writable() {
            changes[n_changes] = new_kevent(fd as libc::uintptr_t, libc::EVFILT_WRITE, flags, token);
            n_changes += 1;
        }

        kevent_register(self.kq, &mut changes[0..n_changes], &[])
            .map_err(|source| Error::Syscall { call: "kevent add", source })
    }

    /// Adds the filters of enabled directions and deletes the others.
    pub fn reregister(&self, fd: RawFd, token: Token, interests: Interests) -> Result<(), Error> {
        let read_flags = if interests.is_readable() {
            libc::EV_ADD | libc::EV_ENABLE
        } else {
            libc::EV_DELETE
        };
        let write_flags = if interests.is_writable() {
            libc::EV_ADD | libc::EV_ENABLE
        } else {
            libc::EV_DELETE
        };

        let mut changes: [libc::kevent; 2] = [
            new_kevent(fd as libc::uintptr_t, libc::EVFILT_READ, read_flags | libc::EV_RECEIPT, token),
            new_kevent(fd as libc::uintptr_t, libc::EVFILT_WRITE, write_flags | libc::EV_RECEIPT, token),
        ];

        // Deleting a filter that was never added returns `ENOENT`.
        kevent_register(self.kq, &mut changes, &[libc::ENOENT as kevent_data_t])
            .map_err(|source| Error::Syscall { call: "kevent mod", source })
    }

    pub fn deregister(&self, fd: RawFd) -> Result<(), Error> {
        let flags = libc::EV_DELETE | libc::EV_RECEIPT;
        // Token is not used.
        let mut changes: [libc::kevent; 2] = [
            new_kevent(fd as libc::uintptr_t, libc::EVFILT_READ, flags, INVALID_TOKEN),
            new_kevent(fd as libc::uintptr_t, libc::EVFILT_WRITE, flags, INVALID_TOKEN),
        ];

        // Closing the descriptor already removed its filters.
        let ignored = [libc::ENOENT as kevent_data_t, libc::EBADF as kevent_data_t];
        match kevent_register(self.kq, &mut changes, &ignored) {
            Ok(()) => Ok(()),
            Err(ref err) if err.raw_os_error() == Some(libc::EBADF) => Ok(()),
            Err(source) => Err(Error::Syscall { call: "kevent del", source }),
        }
    }

    /// The token of record `index`, `None` if the record was invalidated.
    pub fn token(&self, index: usize) -> Option<Token> {
        let token = Token(self.events[index].udata as usize);
        if token == INVALID_TOKEN {
            None
        } else {
            Some(token)
        }
    }

    /// Invalidate all records in `0..end` for `token`. Returns the number of
    /// records invalidated, a descriptor can have both a read and a write
    /// record in one batch.
    pub fn invalidate(&mut self, end: usize, token: Token) -> usize {
        let mut invalidated = 0;
        for kevent in self.events[..end].iter_mut().rev() {
            if kevent.udata as usize == token.0 {
                kevent.udata = INVALID_TOKEN.0 as kevent_udata_t;
                invalidated += 1;
            }
        }
        invalidated
    }

    /// The callback for record `index`, based on the current interests of the
    /// channel.
    pub fn callback(&self, index: usize, read_enabled: bool, write_enabled: bool) -> Option<Callback> {
        let eof = contains_flag(self.events[index].flags, libc::EV_EOF);
        dispatch::kqueue_callback(eof, read_enabled, write_enabled)
    }

    /// Raw flags of record `index`, used in diagnostics.
    pub fn flags(&self, index: usize) -> u32 {
        self.events[index].flags as u32
    }
}

/// Create a `timespec` from a duration.
fn timespec_from_duration(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: cmp::min(duration.as_secs(), libc::time_t::max_value() as u64) as libc::time_t,
        tv_nsec: libc::c_long::from(duration.subsec_nanos()),
    }
}

/// Create a new `kevent`.
fn new_kevent(ident: libc::uintptr_t, filter: kevent_filter_t, flags: kevent_flags_t, token: Token) -> libc::kevent {
    let mut kevent: libc::kevent = unsafe { mem::zeroed() };
    kevent.ident = ident;
    kevent.filter = filter;
    kevent.flags = flags;
    kevent.udata = token.0 as kevent_udata_t;
    kevent
}

fn kevent_register(kq: RawFd, changes: &mut [libc::kevent], ignored_errors: &[kevent_data_t]) -> io::Result<()> {
    // No blocking.
    let timeout = libc::timespec { tv_sec: 0, tv_nsec: 0 };

    let ok = unsafe {
        libc::kevent(kq, changes.as_ptr(), changes.len() as nchanges_t,
            changes.as_mut_ptr(), changes.len() as nchanges_t, &timeout)
    };

    if ok == -1 {
        // EINTR is the only error that we can handle, but according to the man
        // page of FreeBSD: "When kevent() call fails with EINTR error, all
        // changes in the changelist have been applied", so we're done.
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => Ok(()),
            _ => Err(err),
        }
    } else {
        check_errors(&*changes, ignored_errors)
    }
}

/// Check all receipts for possible errors, it returns the first error found.
fn check_errors(events: &[libc::kevent], ignored_errors: &[kevent_data_t]) -> io::Result<()> {
    for event in events {
        // Check for the error flag, the actual error will be in the `data`
        // field.
        if contains_flag(event.flags, libc::EV_ERROR) && event.data != 0 &&
            !ignored_errors.contains(&event.data)
        {
            return Err(io::Error::from_raw_os_error(event.data as i32));
        }
    }
    Ok(())
}

/// Whether or not the provided `flags` contains the provided `flag`.
const fn contains_flag(flags: kevent_flags_t, flag: kevent_flags_t) -> bool {
    (flags & flag) != 0
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("kq", &self.kq)
            .finish()
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        if unsafe { libc::close(self.kq) } == -1 {
            // Possible errors:
            // - EBADF, EIO: can't recover.
            // - EINTR: could try again but we're can't be sure if the file
            //          descriptor was closed or not, so to be safe we don't
            //          close it again.
            let err = io::Error::last_os_error();
            error!("error closing kqueue: {}", err);
        }
    }
}
