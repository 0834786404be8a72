use std::cell::RefCell;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

use crate::reactor::Reactor;

/// Callback registered for a handle's readiness events. The reactor hands
/// itself to the callback, so event handlers can attach, detach, schedule,
/// or stop from inside a dispatch.
pub type IoCallback = Rc<RefCell<dyn FnMut(&mut Reactor, Event)>>;

const READ: u8 = 0b001;
const WRITE: u8 = 0b010;
const ERROR: u8 = 0b100;

/// Set of event kinds a caller is interested in for one handle.
///
/// Compose with `|`: `Interest::READ | Interest::WRITE`. There is no way to
/// build an empty set, so "no event kinds" is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
    pub const READ: Interest = Interest(READ);
    pub const WRITE: Interest = Interest(WRITE);
    pub const ERROR: Interest = Interest(ERROR);

    pub(crate) const NONE: Interest = Interest(0);

    pub fn is_readable(self) -> bool {
        self.0 & READ != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & WRITE != 0
    }

    pub fn is_error(self) -> bool {
        self.0 & ERROR != 0
    }

    pub fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, other: Interest) -> Interest {
        Interest(self.0 | other.0)
    }
}

/// A readiness event delivered to a callback: which handle, and which of its
/// registered kinds became ready.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    fd: RawFd,
    ready: Interest,
}

impl Event {
    /// Built by backends when translating an O/S readiness report.
    pub fn new(fd: RawFd, ready: Interest) -> Event {
        Event { fd, ready }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn is_readable(&self) -> bool {
        self.ready.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.ready.is_writable()
    }

    pub fn is_error(&self) -> bool {
        self.ready.is_error()
    }
}

/// A readiness-multiplexing strategy, injected into the reactor at
/// construction.
///
/// The backend owns all per-handle registration state. Repeat registration
/// of a handle is additive: the new interest is unioned with the old.
pub trait Backend {
    /// Registers or extends interest in a handle. Attaching a closed or
    /// invalid handle fails synchronously and leaves no state behind.
    fn register(&mut self, fd: RawFd, interest: Interest, callback: IoCallback) -> io::Result<()>;

    /// Drops a handle's registration. Returns `false` if it was not
    /// attached; deregistering twice is harmless.
    fn deregister(&mut self, fd: RawFd) -> bool;

    /// One bounded readiness poll. `timeout` is an upper bound on blocking.
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Event>>;

    /// Resolves the callback for a polled event against the registrations as
    /// they are *now*, so a handle detached after the poll but before its
    /// dispatch resolves to `None` instead of a stale callback.
    fn callback_for(&self, event: &Event) -> Option<IoCallback>;

    fn is_attached(&self, fd: RawFd) -> bool;

    /// Number of attached handles.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
