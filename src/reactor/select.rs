use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::reactor::backend::{Backend, Event, Interest, IoCallback};

const READ_SLOT: usize = 0;
const WRITE_SLOT: usize = 1;
const ERROR_SLOT: usize = 2;

const KINDS: [(Interest, usize); 3] = [
    (Interest::READ, READ_SLOT),
    (Interest::WRITE, WRITE_SLOT),
    (Interest::ERROR, ERROR_SLOT),
];

struct Record {
    interest: Interest,
    /// One callback per event kind; an attach fills the slot for every kind
    /// it names, so different kinds can carry different callbacks.
    callbacks: [Option<IoCallback>; 3],
}

impl Record {
    fn new() -> Record {
        Record { interest: Interest::NONE, callbacks: [None, None, None] }
    }
}

/// Readiness backend over `poll(2)`.
///
/// Available everywhere, with bounded latency; each cycle rebuilds the fd
/// set from the registrations, so cost grows linearly with the number of
/// watched handles.
pub struct Select {
    handles: HashMap<RawFd, Record>,
}

impl Select {
    pub fn new() -> Select {
        Select { handles: HashMap::new() }
    }

    fn fd_is_open(fd: RawFd) -> bool {
        // SAFETY: F_GETFD only inspects the descriptor table entry.
        unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
    }
}

impl Backend for Select {
    fn register(&mut self, fd: RawFd, interest: Interest, callback: IoCallback) -> io::Result<()> {
        if !Self::fd_is_open(fd) {
            return Err(io::Error::last_os_error());
        }
        let record = self.handles.entry(fd).or_insert_with(Record::new);
        record.interest = record.interest | interest;
        for (kind, slot) in KINDS {
            if interest.contains(kind) {
                record.callbacks[slot] = Some(callback.clone());
            }
        }
        Ok(())
    }

    fn deregister(&mut self, fd: RawFd) -> bool {
        self.handles.remove(&fd).is_some()
    }

    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<Event>> {
        // a handle closed since the last cycle silently leaves the set
        self.handles.retain(|&fd, _| Self::fd_is_open(fd));

        let mut pollfds: Vec<libc::pollfd> = Vec::with_capacity(self.handles.len());
        for (&fd, record) in &self.handles {
            let mut events: libc::c_short = 0;
            if record.interest.is_readable() {
                events |= libc::POLLIN;
            }
            if record.interest.is_writable() {
                events |= libc::POLLOUT;
            }
            // POLLERR and POLLNVAL are always reported, so error-only
            // interest needs no request bits
            pollfds.push(libc::pollfd { fd, events, revents: 0 });
        }

        let timeout_ms: libc::c_int = timeout.as_millis().try_into().unwrap_or(libc::c_int::MAX);
        // SAFETY: the array outlives the call and nfds matches its length;
        // with zero fds poll(2) degrades to a bounded sleep.
        let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout_ms) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }

        let mut ready = Vec::new();
        for pollfd in &pollfds {
            if pollfd.revents == 0 {
                continue;
            }
            let Some(record) = self.handles.get(&pollfd.fd) else {
                continue;
            };
            // one single-kind event per (handle, kind) the caller registered
            if pollfd.revents & (libc::POLLIN | libc::POLLHUP) != 0 && record.interest.is_readable() {
                ready.push(Event::new(pollfd.fd, Interest::READ));
            }
            if pollfd.revents & libc::POLLOUT != 0 && record.interest.is_writable() {
                ready.push(Event::new(pollfd.fd, Interest::WRITE));
            }
            if pollfd.revents & (libc::POLLERR | libc::POLLNVAL) != 0 && record.interest.is_error() {
                ready.push(Event::new(pollfd.fd, Interest::ERROR));
            }
        }
        Ok(ready)
    }

    fn callback_for(&self, event: &Event) -> Option<IoCallback> {
        let record = self.handles.get(&event.fd())?;
        let slot = if event.is_readable() {
            READ_SLOT
        } else if event.is_writable() {
            WRITE_SLOT
        } else {
            ERROR_SLOT
        };
        record.callbacks[slot].clone()
    }

    fn is_attached(&self, fd: RawFd) -> bool {
        self.handles.contains_key(&fd)
    }

    fn len(&self) -> usize {
        self.handles.len()
    }
}

impl Default for Select {
    fn default() -> Self {
        Select::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Write;
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    fn noop_callback() -> IoCallback {
        Rc::new(RefCell::new(|_: &mut crate::Reactor, _: Event| {}))
    }

    #[test]
    fn registering_an_invalid_fd_fails_synchronously() {
        let mut backend = Select::new();
        assert!(backend.register(-1, Interest::READ, noop_callback()).is_err());
        assert_eq!(backend.len(), 0);
    }

    #[test]
    fn repeat_registration_unions_interest() {
        let mut backend = Select::new();
        let (local, _remote) = UnixStream::pair().unwrap();
        let fd = local.as_raw_fd();

        backend.register(fd, Interest::READ, noop_callback()).unwrap();
        backend.register(fd, Interest::WRITE, noop_callback()).unwrap();
        assert_eq!(backend.len(), 1);

        let record = backend.handles.get(&fd).unwrap();
        assert!(record.interest.is_readable());
        assert!(record.interest.is_writable());
        assert!(record.callbacks[READ_SLOT].is_some());
        assert!(record.callbacks[WRITE_SLOT].is_some());
        assert!(record.callbacks[ERROR_SLOT].is_none());
    }

    #[test]
    fn poll_reports_one_event_per_registered_kind() {
        let mut backend = Select::new();
        let (mut local, remote) = UnixStream::pair().unwrap();
        let fd = remote.as_raw_fd();
        backend.register(fd, Interest::READ | Interest::WRITE, noop_callback()).unwrap();

        local.write_all(b"hi").unwrap();
        let events = backend.poll(Duration::from_millis(100)).unwrap();

        let mut kinds: Vec<&str> = events
            .iter()
            .filter(|event| event.fd() == fd)
            .map(|event| if event.is_readable() { "read" } else { "write" })
            .collect();
        kinds.sort_unstable();
        assert_eq!(kinds, ["read", "write"]);
    }

    #[test]
    fn closed_handles_are_dropped_on_the_next_cycle() {
        let mut backend = Select::new();
        let (local, remote) = UnixStream::pair().unwrap();
        let fd = remote.as_raw_fd();
        backend.register(fd, Interest::READ, noop_callback()).unwrap();
        assert_eq!(backend.len(), 1);

        drop(remote);
        drop(local);
        backend.poll(Duration::ZERO).unwrap();
        assert_eq!(backend.len(), 0);
    }

    #[test]
    fn deregister_is_idempotent() {
        let mut backend = Select::new();
        let (local, _remote) = UnixStream::pair().unwrap();
        let fd = local.as_raw_fd();
        backend.register(fd, Interest::READ, noop_callback()).unwrap();

        assert!(backend.deregister(fd));
        assert!(!backend.deregister(fd));
        assert!(!backend.is_attached(fd));
    }
}
