use std::fmt;
use std::ops::BitOr;

/// Interests of a [`Channel`].
///
/// Interests indicate what readiness the [`Poller`] should monitor a channel
/// for. For example if a channel only has [readable] interests and its
/// descriptor becomes writable, the channel is not invoked.
///
/// Unlike most readiness sets, `Interests` may be empty: a channel that
/// disabled both directions stays registered. With kqueue no filter is armed
/// and the channel is never dispatched to. epoll always reports hang-up and
/// errors, so with epoll such a channel still has [`Channel::handle_read`]
/// called once its descriptor is hung up or in an error state (level
/// triggered, i.e. on every call to [`Poller::loop_once`] until it's removed).
///
/// [`Channel::handle_read`]: crate::Channel::handle_read
/// [`Poller::loop_once`]: crate::Poller::loop_once
///
/// [`Channel`]: crate::Channel
/// [`Poller`]: crate::Poller
/// [readable]: Interests::READABLE
///
/// # Examples
///
/// ```
/// use reactor_poller::Interests;
///
/// let interests = Interests::READABLE | Interests::WRITABLE;
/// assert!(interests.is_readable());
/// assert!(interests.is_writable());
/// assert_eq!(interests, Interests::BOTH);
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Interests(u8);

const READABLE: u8 = 1 << 0;
const WRITABLE: u8 = 1 << 1;

impl Interests {
    /// No interests.
    pub const EMPTY: Interests = Interests(0);

    /// Readable interest.
    pub const READABLE: Interests = Interests(READABLE);

    /// Writable interest.
    pub const WRITABLE: Interests = Interests(WRITABLE);

    /// Both readable and writable interests.
    pub const BOTH: Interests = Interests(READABLE | WRITABLE);

    /// Create interests from separate read and write flags.
    pub const fn from_flags(readable: bool, writable: bool) -> Interests {
        let mut bits = 0;
        if readable {
            bits |= READABLE;
        }
        if writable {
            bits |= WRITABLE;
        }
        Interests(bits)
    }

    /// Returns true if the value includes readable interest.
    #[inline]
    pub const fn is_readable(self) -> bool {
        (self.0 & READABLE) != 0
    }

    /// Returns true if the value includes writable interest.
    #[inline]
    pub const fn is_writable(self) -> bool {
        (self.0 & WRITABLE) != 0
    }

    /// Returns true if neither readable nor writable interest is set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Interests {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Interests(self.0 | rhs.0)
    }
}

impl fmt::Debug for Interests {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => f.write_str("READABLE | WRITABLE"),
            (true, false) => f.write_str("READABLE"),
            (false, true) => f.write_str("WRITABLE"),
            (false, false) => f.write_str("(empty)"),
        }
    }
}
