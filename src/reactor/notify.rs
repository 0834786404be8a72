use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::Token;

use crate::reactor::backend::{Backend, Event, Interest, IoCallback};

struct Registration {
    interest: Interest,
    /// Kernel registration is singular per handle, so one callback serves
    /// every kind; the latest attach wins.
    callback: IoCallback,
    /// False for error-only interest: there is no direction to register,
    /// so the handle stays inert until read or write interest arrives.
    registered: bool,
}

/// Readiness backend over the kernel's event-notification facility
/// (epoll/kqueue via `mio`).
///
/// Handles are registered with the kernel once, tagged by a token derived
/// from the fd, so a poll cycle touches only the handles that actually
/// became ready. Notifications are edge-style: callbacks should drain the
/// handle before returning.
pub struct Notify {
    poll: mio::Poll,
    events: mio::Events,
    handles: HashMap<RawFd, Registration>,
}

impl Notify {
    pub fn new() -> io::Result<Notify> {
        Ok(Notify {
            poll: mio::Poll::new()?,
            events: mio::Events::with_capacity(128),
            handles: HashMap::new(),
        })
    }

    /// Whether the kernel facility can be set up at all in this process.
    pub fn available() -> bool {
        mio::Poll::new().is_ok()
    }

    fn direction(interest: Interest) -> Option<mio::Interest> {
        match (interest.is_readable(), interest.is_writable()) {
            (true, true) => Some(mio::Interest::READABLE | mio::Interest::WRITABLE),
            (true, false) => Some(mio::Interest::READABLE),
            (false, true) => Some(mio::Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

impl Backend for Notify {
    fn register(&mut self, fd: RawFd, interest: Interest, callback: IoCallback) -> io::Result<()> {
        let merged = match self.handles.get(&fd) {
            Some(registration) => registration.interest | interest,
            None => interest,
        };
        let was_registered = self.handles.get(&fd).is_some_and(|r| r.registered);
        let registered = match Self::direction(merged) {
            Some(direction) => {
                let token = Token(fd as usize);
                if was_registered {
                    self.poll.registry().reregister(&mut SourceFd(&fd), token, direction)?;
                } else {
                    self.poll.registry().register(&mut SourceFd(&fd), token, direction)?;
                }
                true
            }
            None => false,
        };
        self.handles.insert(fd, Registration { interest: merged, callback, registered });
        Ok(())
    }

    fn deregister(&mut self, fd: RawFd) -> bool {
        match self.handles.remove(&fd) {
            Some(registration) => {
                if registration.registered {
                    // a closed fd is already gone from the kernel set
                    let _ = self.poll.registry().deregister(&mut SourceFd(&fd));
                }
                true
            }
            None => false,
        }
    }

    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Event>> {
        self.poll.poll(&mut self.events, Some(timeout))?;

        let mut ready = Vec::new();
        for event in self.events.iter() {
            let fd = event.token().0 as RawFd;
            let Some(registration) = self.handles.get(&fd) else {
                continue;
            };
            let mut kinds = Interest::NONE;
            if (event.is_readable() || event.is_read_closed()) && registration.interest.is_readable() {
                kinds = kinds | Interest::READ;
            }
            if (event.is_writable() || event.is_write_closed()) && registration.interest.is_writable() {
                kinds = kinds | Interest::WRITE;
            }
            if event.is_error() && registration.interest.is_error() {
                kinds = kinds | Interest::ERROR;
            }
            if kinds != Interest::NONE {
                ready.push(Event::new(fd, kinds));
            }
        }
        Ok(ready)
    }

    fn callback_for(&self, event: &Event) -> Option<IoCallback> {
        self.handles.get(&event.fd()).map(|registration| registration.callback.clone())
    }

    fn is_attached(&self, fd: RawFd) -> bool {
        self.handles.contains_key(&fd)
    }

    fn len(&self) -> usize {
        self.handles.len()
    }
}
