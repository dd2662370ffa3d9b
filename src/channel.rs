use std::os::unix::io::RawFd;

use crate::{Interests, Poller};

/// Identifies a channel registered with a [`Poller`].
///
/// A `Token` is returned by [`Poller::add_channel`] and passed back to the
/// channel in each callback. It is a slot in the poller's registry and is only
/// valid until the channel is removed, after which the same value may be handed
/// out to a newly added channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub usize);

/// The only invalid token, stored in readiness records that are invalidated.
pub(crate) const INVALID_TOKEN: Token = Token(usize::MAX);

impl From<usize> for Token {
    fn from(val: usize) -> Token {
        Token(val)
    }
}

impl From<Token> for usize {
    fn from(val: Token) -> usize {
        val.0
    }
}

/// A handler bound to a single file descriptor.
///
/// Channels are owned by the caller and shared with the [`Poller`] as
/// `Rc<RefCell<_>>`, the poller only keeps a weak reference. All methods are
/// called on the thread that owns the poller.
///
/// # Interests
///
/// The poller reads [`interests`] when the channel is added and each time
/// [`Poller::update_channel`] is called. Changing what `interests` returns
/// without calling `update_channel` leaves the system registration out of
/// sync.
///
/// With epoll hang-up and errors are always reported to [`handle_read`], even
/// if read interest is disabled, see [`Interests`].
///
/// [`interests`]: Channel::interests
/// [`handle_read`]: Channel::handle_read
///
/// # Closing
///
/// [`close`] must result in the channel leaving the poller, i.e. it must call
/// [`Poller::remove_channel`] with the provided token. It is called by the
/// poller when it's dropped while the channel is still registered and may be
/// called from within any callback. The channel must be removed before its
/// descriptor is closed, otherwise the descriptor number may already be reused
/// when the poller removes it from the system selector.
///
/// [`close`]: Channel::close
pub trait Channel {
    /// Stable identity of the channel, only used in diagnostics.
    fn id(&self) -> u64;

    /// The file descriptor this channel is bound to.
    fn fd(&self) -> RawFd;

    /// Combined read and write interests.
    fn interests(&self) -> Interests;

    /// Whether or not read interest is enabled.
    fn read_enabled(&self) -> bool {
        self.interests().is_readable()
    }

    /// Whether or not write interest is enabled.
    fn write_enabled(&self) -> bool {
        self.interests().is_writable()
    }

    /// Called when the descriptor is readable, hung up or in an error state.
    fn handle_read(&mut self, poller: &mut Poller, token: Token);

    /// Called when the descriptor is writable.
    fn handle_write(&mut self, poller: &mut Poller, token: Token);

    /// Detach the channel from `poller`.
    fn close(&mut self, poller: &mut Poller, token: Token);
}
