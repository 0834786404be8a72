pub mod backend;
pub mod notify;
pub mod select;

pub use backend::{Backend, Event, Interest, IoCallback};
pub use notify::Notify;
pub use select::Select;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::timers;

/// Upper bound on how long one tick may block in the backend poll.
const POLL_BUDGET: Duration = Duration::from_millis(100);

type HookFn = Box<dyn FnOnce(&mut Reactor)>;

/// Which multiplexing strategy a reactor runs on.
///
/// [`detect`](Engine::detect) probes the kernel facility once per process
/// and the answer is frozen from then on; there is no switching strategies
/// under a live reactor, because backend-owned registration state is not
/// portable between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Notify,
    Select,
}

static ENGINE: OnceLock<Engine> = OnceLock::new();

impl Engine {
    /// Prefers [`Notify`]; falls back to [`Select`] when the kernel facility
    /// is unavailable. Memoized for the process lifetime.
    pub fn detect() -> Engine {
        *ENGINE.get_or_init(|| {
            if Notify::available() {
                Engine::Notify
            } else {
                Engine::Select
            }
        })
    }

    /// Builds a fresh backend of this flavor. Unavailability is never an
    /// error: a `Notify` that cannot be constructed degrades to `Select`.
    pub fn backend(self) -> Box<dyn Backend> {
        match self {
            Engine::Notify => match Notify::new() {
                Ok(notify) => Box::new(notify),
                Err(_) => Box::new(Select::new()),
            },
            Engine::Select => Box::new(Select::new()),
        }
    }
}

/// A single-threaded readiness reactor.
///
/// One `tick` is three phases in fixed order: drain the next-tick FIFO,
/// poll the backend and dispatch ready events, then drain due timers.
/// Everything runs on the calling thread; the only blocking point is the
/// backend poll, bounded by a short budget. Callbacks receive `&mut Reactor`
/// and may freely attach, detach, schedule, or stop mid-tick.
pub struct Reactor {
    running: bool,
    timers: timers::Queue<HookFn>,
    deferred: VecDeque<HookFn>,
    backend: Box<dyn Backend>,
}

impl Reactor {
    /// A reactor on the process-wide detected engine.
    pub fn new() -> Reactor {
        Reactor::with_backend(Engine::detect().backend())
    }

    /// A reactor on an explicitly injected backend.
    pub fn with_backend(backend: Box<dyn Backend>) -> Reactor {
        Reactor { running: false, timers: timers::Queue::new(), deferred: VecDeque::new(), backend }
    }

    /// Registers interest in readiness events on a handle. Repeat attaches
    /// union the event kinds into the handle's existing interest set.
    ///
    /// Returns the reactor for chaining.
    pub fn attach(
        &mut self,
        fd: RawFd,
        interest: Interest,
        callback: impl FnMut(&mut Reactor, Event) + 'static,
    ) -> io::Result<&mut Self> {
        let callback: IoCallback = Rc::new(RefCell::new(callback));
        self.backend.register(fd, interest, callback)?;
        Ok(self)
    }

    /// Unregisters a handle. Idempotent; immediate, even mid-dispatch.
    pub fn detach(&mut self, fd: RawFd) -> &mut Self {
        self.backend.deregister(fd);
        self
    }

    pub fn is_attached(&self, fd: RawFd) -> bool {
        self.backend.is_attached(fd)
    }

    /// Schedules one-shot work `offset` from now.
    pub fn add_timer(&mut self, offset: Duration, callback: impl FnOnce(&mut Reactor) + 'static) {
        self.timers.add_after(offset, Box::new(callback));
    }

    /// Schedules one-shot work at an absolute time.
    pub fn add_timer_at(&mut self, when: Instant, callback: impl FnOnce(&mut Reactor) + 'static) {
        self.timers.add_at(when, Box::new(callback));
    }

    /// Schedules work for the start of the next tick, ahead of any I/O or
    /// timer dispatch in that tick. FIFO.
    pub fn next_tick(&mut self, callback: impl FnOnce(&mut Reactor) + 'static) {
        self.deferred.push_back(Box::new(callback));
    }

    /// True iff nothing is outstanding: no handles, no timers, no deferred
    /// work. Useful for drain-and-exit loops.
    pub fn is_empty(&self) -> bool {
        self.backend.is_empty() && self.timers.is_empty() && self.deferred.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One pass of the drain-poll-drain cycle.
    pub fn tick(&mut self) -> io::Result<()> {
        self.run_deferred();
        self.poll_io()?;
        self.run_timers();
        Ok(())
    }

    /// Runs the loop until [`stop`](Self::stop). `setup` is invoked once
    /// before the first tick, typically to seed the initial attaches.
    pub fn run(&mut self, setup: impl FnOnce(&mut Reactor)) -> io::Result<()> {
        self.running = true;
        setup(self);
        while self.running {
            self.tick()?;
        }
        Ok(())
    }

    /// Requests loop exit once the in-flight tick completes. Never
    /// interrupts a callback mid-execution.
    pub fn stop(&mut self) {
        self.running = false;
    }

    fn run_deferred(&mut self) {
        // length snapshot: work queued during the drain waits for the next
        // tick, so self-re-queuing callbacks cannot livelock the loop
        for _ in 0..self.deferred.len() {
            if let Some(callback) = self.deferred.pop_front() {
                callback(self);
            }
        }
    }

    fn poll_io(&mut self) -> io::Result<()> {
        let timeout = self.poll_timeout();
        let events = match self.backend.poll(timeout) {
            Ok(events) => events,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(err),
        };
        for event in events {
            // resolve through the backend at dispatch time: a callback
            // earlier in this batch may have detached this handle
            let Some(callback) = self.backend.callback_for(&event) else {
                continue;
            };
            (&mut *callback.borrow_mut())(self, event);
        }
        Ok(())
    }

    fn run_timers(&mut self) {
        let now = Instant::now();
        while let Some((_, callback)) = self.timers.pop_due(now) {
            callback(self);
        }
    }

    fn poll_timeout(&self) -> Duration {
        if !self.deferred.is_empty() {
            return Duration::ZERO;
        }
        match self.timers.next_time() {
            Some(when) => POLL_BUDGET.min(when.saturating_duration_since(Instant::now())),
            None => POLL_BUDGET,
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Reactor::new()
    }
}
