use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::sorted::SortedLinkMap;
use crate::task::{Status, Task, Timed};
use crate::timers::TimeKey;

/// Identity of an enqueued task, for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Schedules [`Timed`] tasks in trigger-time buckets.
///
/// Tasks sharing an exact trigger time share one bucket; buckets sit in a
/// [`SortedLinkMap`], so a dispatch walks them earliest-first and can stop at
/// the first bucket that is still in the future. A task invoked by one
/// dispatch stays in its bucket as `Done` and is reaped by a later dispatch.
pub struct TaskQueue {
    buckets: SortedLinkMap<TimeKey, Vec<(TaskId, Timed)>>,
    times: HashMap<TaskId, TimeKey>,
    next_id: u64,
    reaper: Option<Box<dyn FnMut(TaskId)>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue { buckets: SortedLinkMap::new(), times: HashMap::new(), next_id: 0, reaper: None }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Hook invoked with each task reaped by [`dispatch`](Self::dispatch).
    pub fn set_reap_hook(&mut self, hook: impl FnMut(TaskId) + 'static) {
        self.reaper = Some(Box::new(hook));
    }

    /// Enqueues a bare work block as a task eligible as soon as possible.
    pub fn enqueue(&mut self, work: impl FnMut(&mut Task) + 'static) -> TaskId {
        self.enqueue_task(Timed::new(work))
    }

    /// Enqueues a bare work block, eligible `offset` from now.
    pub fn enqueue_after(&mut self, offset: Duration, work: impl FnMut(&mut Task) + 'static) -> TaskId {
        self.enqueue_task(Timed::after(offset, work))
    }

    /// Inserts a task into the bucket for its trigger time.
    pub fn enqueue_task(&mut self, task: Timed) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let key = TimeKey(task.trigger_time());
        self.times.insert(id, key);
        self.buckets.get_or_insert_with(key, Vec::new).push((id, task));
        id
    }

    /// Removes a task that has not yet run. Returns `false` when the id is
    /// unknown or the task was already dispatched.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let Some(&key) = self.times.get(&id) else {
            return false;
        };
        let Some(bucket) = self.buckets.get_mut(&key) else {
            return false;
        };
        let Some(at) = bucket.iter().position(|(tid, task)| *tid == id && task.status() == Status::Pending)
        else {
            return false;
        };
        bucket.remove(at);
        let drained = bucket.is_empty();
        if drained {
            self.buckets.delete(&key);
        }
        self.times.remove(&id);
        true
    }

    /// Walks buckets from the earliest trigger time forward while they are
    /// due: pending tasks run, done tasks are reaped. Stops at the first
    /// future bucket, since no later bucket can be due either.
    pub fn dispatch(&mut self) {
        let now = Instant::now();
        let mut cursor = self.buckets.first_node();
        while let Some(node) = cursor {
            let Some((&key, _)) = self.buckets.node(node) else {
                break;
            };
            if key.0 > now {
                break;
            }
            cursor = self.buckets.next(node);

            let mut reaped = Vec::new();
            let Some(bucket) = self.buckets.get_mut(&key) else {
                continue;
            };
            let mut at = 0;
            while at < bucket.len() {
                let (id, task) = &mut bucket[at];
                match task.status() {
                    Status::Pending => {
                        task.call();
                        at += 1;
                    }
                    Status::Done => {
                        reaped.push(*id);
                        bucket.remove(at);
                    }
                    Status::Running => at += 1,
                }
            }
            if bucket.is_empty() {
                self.buckets.delete(&key);
            }
            for id in reaped {
                self.times.remove(&id);
                if let Some(hook) = self.reaper.as_mut() {
                    hook(id);
                }
            }
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        TaskQueue::new()
    }
}
