//! Collection of testing utilities.

// Not all functions are used in all tests, causing warnings of unused functions
// while other tests are actually using them.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Read;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;

use reactor_poller::{Channel, FatalPolicy, Interests, LogDiagnostics, Poller, Token};

/// Data used in reading and writing tests.
pub const DATA: &[u8; 12] = b"Hello world!";

/// Initialise the test setup, things like logging etc.
pub fn init() {
    let env = env_logger::Env::new().filter("LOG_LEVEL");
    // Logger could already be set, so we ignore the result.
    drop(env_logger::try_init_from_env(env));
}

/// Initialise the test setup (same as `init`) and create a `Poller` that
/// panics on fatal errors.
pub fn init_with_poller() -> Poller {
    init();
    Poller::with_diagnostics(Box::new(LogDiagnostics::new(FatalPolicy::Panic)))
}

/// A callback invoked on a `TestChannel`, along with the channel's id.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Read(u64),
    Write(u64),
    Close(u64),
}

/// Log of calls shared between channels.
pub type Calls = Rc<RefCell<Vec<Call>>>;

pub fn new_calls() -> Calls {
    Rc::new(RefCell::new(Vec::new()))
}

/// Hook run after the callback is recorded.
pub type Hook = Box<dyn FnMut(&mut Poller, Token)>;

/// `Channel` backed by one end of a unix socket pair, recording all calls.
pub struct TestChannel {
    pub id: u64,
    pub stream: UnixStream,
    pub interests: Interests,
    pub calls: Calls,
    /// Drain the socket in `handle_read`.
    pub drain: bool,
    /// Call `close` from `handle_read`.
    pub close_on_read: bool,
    /// Remove itself from the poller in `close`.
    pub detach_on_close: bool,
    /// Disable write interest, and update the poller, in `handle_write`.
    pub disable_write_on_write: bool,
    pub on_read: Option<Hook>,
}

impl TestChannel {
    /// Create a new channel, returning it along with the other end of the
    /// socket pair.
    pub fn new(id: u64, interests: Interests, calls: &Calls) -> (TestChannel, UnixStream) {
        let (stream, peer) = UnixStream::pair().expect("unable to create socket pair");
        stream.set_nonblocking(true).expect("unable to set non-blocking");
        let channel = TestChannel {
            id,
            stream,
            interests,
            calls: calls.clone(),
            drain: false,
            close_on_read: false,
            detach_on_close: true,
            disable_write_on_write: false,
            on_read: None,
        };
        (channel, peer)
    }

    pub fn shared(self) -> Rc<RefCell<TestChannel>> {
        Rc::new(RefCell::new(self))
    }
}

impl Channel for TestChannel {
    fn id(&self) -> u64 {
        self.id
    }

    fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    fn interests(&self) -> Interests {
        self.interests
    }

    fn handle_read(&mut self, poller: &mut Poller, token: Token) {
        self.calls.borrow_mut().push(Call::Read(self.id));
        if self.drain {
            let mut buf = [0; 64];
            while let Ok(n) = self.stream.read(&mut buf) {
                if n == 0 {
                    break;
                }
            }
        }
        if let Some(hook) = self.on_read.as_mut() {
            hook(poller, token);
        }
        if self.close_on_read {
            self.close(poller, token);
        }
    }

    fn handle_write(&mut self, poller: &mut Poller, token: Token) {
        self.calls.borrow_mut().push(Call::Write(self.id));
        if self.disable_write_on_write {
            self.interests = Interests::from_flags(self.interests.is_readable(), false);
            poller.update_channel(token, &*self);
        }
    }

    fn close(&mut self, poller: &mut Poller, token: Token) {
        self.calls.borrow_mut().push(Call::Close(self.id));
        if self.detach_on_close {
            poller.remove_channel(token);
        }
    }
}

/// `Channel` with an invalid descriptor.
pub struct BadChannel;

impl Channel for BadChannel {
    fn id(&self) -> u64 {
        99
    }

    fn fd(&self) -> RawFd {
        -1
    }

    fn interests(&self) -> Interests {
        Interests::READABLE
    }

    fn handle_read(&mut self, _: &mut Poller, _: Token) {
        unreachable!();
    }

    fn handle_write(&mut self, _: &mut Poller, _: Token) {
        unreachable!();
    }

    fn close(&mut self, poller: &mut Poller, token: Token) {
        poller.remove_channel(token);
    }
}
