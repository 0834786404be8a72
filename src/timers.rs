use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::sorted::SortedLinkMap;

/// `Instant` implements `Ord` but not `Hash`, and the sorted map's lookup
/// table needs both. `TimeKey` hashes the distance from a process-local
/// origin; instants before the origin collapse to one hash bucket, which is
/// legal since equality stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimeKey(pub(crate) Instant);

static ORIGIN: OnceLock<Instant> = OnceLock::new();

impl Hash for TimeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let origin = *ORIGIN.get_or_init(Instant::now);
        self.0.saturating_duration_since(origin).hash(state);
    }
}

/// A queue of entries keyed by trigger time.
///
/// Entries sharing an exact trigger time form a FIFO bucket; buckets are held
/// in a [`SortedLinkMap`] so the minimum pending time is an O(1) question.
/// The queue is generic over its entry: the reactor stores its timer
/// callbacks here, and the invocation helpers ([`call_next`](Self::call_next),
/// [`call`](Self::call)) are available when the entries are plain boxed
/// closures.
pub struct Queue<T> {
    buckets: SortedLinkMap<TimeKey, VecDeque<T>>,
    len: usize,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Queue { buckets: SortedLinkMap::new(), len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Schedules an entry at an absolute trigger time.
    pub fn add_at(&mut self, when: Instant, entry: T) {
        self.buckets.get_or_insert_with(TimeKey(when), VecDeque::new).push_back(entry);
        self.len += 1;
    }

    /// Schedules an entry `offset` from now.
    pub fn add_after(&mut self, offset: Duration, entry: T) {
        self.add_at(Instant::now() + offset, entry);
    }

    /// The minimum pending trigger time, in O(1).
    pub fn next_time(&self) -> Option<Instant> {
        self.buckets.first_key().map(|key| key.0)
    }

    /// True iff some pending entry's trigger time has passed.
    pub fn is_ready(&self) -> bool {
        match self.next_time() {
            Some(when) => when <= Instant::now(),
            None => false,
        }
    }

    /// Pops the earliest-time, earliest-queued entry, dropping its bucket if
    /// that drained it.
    pub fn shift(&mut self) -> Option<(Instant, T)> {
        let when = self.next_time()?;
        let bucket = self.buckets.get_mut(&TimeKey(when))?;
        let entry = bucket.pop_front()?;
        if bucket.is_empty() {
            self.buckets.delete(&TimeKey(when));
        }
        self.len -= 1;
        Some((when, entry))
    }

    /// Like [`shift`](Self::shift), but only for entries due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(Instant, T)> {
        if self.next_time()? <= now {
            self.shift()
        } else {
            None
        }
    }
}

impl<R> Queue<Box<dyn FnOnce() -> R>> {
    /// Pops one entry and invokes it. A panicking entry propagates to the
    /// caller, halting any further draining.
    pub fn call_next(&mut self) -> Option<R> {
        self.shift().map(|(_, entry)| entry())
    }

    /// Drains and invokes every currently-ready entry. Returns `None` when
    /// nothing was due, so callers can tell "nothing fired" from "fired and
    /// produced these results".
    pub fn call(&mut self) -> Option<Vec<R>> {
        let mut results = Vec::new();
        while self.is_ready() {
            match self.call_next() {
                Some(result) => results.push(result),
                None => break,
            }
        }
        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Queue::new()
    }
}
