use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of a [`Task`]. Transitions are monotonic:
/// pending → running → done, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Running,
    Done,
}

/// A unit of deferred work.
///
/// The work block receives the task itself so it can inspect its own
/// lifecycle while running.
pub struct Task {
    status: Status,
    work: Option<Box<dyn FnMut(&mut Task)>>,
}

impl Task {
    pub fn new(work: impl FnMut(&mut Task) + 'static) -> Self {
        Task { status: Status::Pending, work: Some(Box::new(work)) }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// A base task is runnable whenever it is still pending.
    pub fn runnable(&self) -> bool {
        self.status == Status::Pending
    }

    /// Runs the work block once. Returns `false` without running anything
    /// unless the task is pending; a task therefore never re-runs.
    ///
    /// The task lands on `Done` even if the work panics, so an error can
    /// never strand it in `Running`; the panic itself still unwinds to the
    /// caller.
    pub fn call(&mut self) -> bool {
        if self.status != Status::Pending {
            return false;
        }
        let Some(mut work) = self.work.take() else {
            return false;
        };
        self.status = Status::Running;

        struct DoneOnDrop<'a>(&'a mut Task);
        impl Drop for DoneOnDrop<'_> {
            fn drop(&mut self) {
                self.0.status = Status::Done;
            }
        }

        let mut guard = DoneOnDrop(self);
        work(&mut *guard.0);
        true
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("status", &self.status).finish_non_exhaustive()
    }
}

/// A [`Task`] gated behind a trigger time, fixed at construction.
pub struct Timed {
    task: Task,
    trigger_time: Instant,
}

impl Timed {
    /// A task eligible to run as soon as possible.
    pub fn new(work: impl FnMut(&mut Task) + 'static) -> Self {
        Timed::at(Instant::now(), work)
    }

    /// A task eligible at an absolute trigger time.
    pub fn at(trigger_time: Instant, work: impl FnMut(&mut Task) + 'static) -> Self {
        Timed { task: Task::new(work), trigger_time }
    }

    /// A task eligible `offset` from now.
    pub fn after(offset: Duration, work: impl FnMut(&mut Task) + 'static) -> Self {
        Timed::at(Instant::now() + offset, work)
    }

    pub fn trigger_time(&self) -> Instant {
        self.trigger_time
    }

    pub fn status(&self) -> Status {
        self.task.status()
    }

    /// Pending is not enough here: the trigger time must also have passed.
    pub fn runnable(&self) -> bool {
        self.task.runnable() && Instant::now() >= self.trigger_time
    }

    /// Like [`Task::call`], but refuses to run before the trigger time.
    pub fn call(&mut self) -> bool {
        if Instant::now() < self.trigger_time {
            return false;
        }
        self.task.call()
    }
}

impl fmt::Debug for Timed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timed")
            .field("status", &self.task.status)
            .field("trigger_time", &self.trigger_time)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::rc::Rc;
    use std::thread;

    #[test]
    fn lifecycle_moves_pending_running_done() {
        let mut task = Task::new(|task| {
            assert_eq!(task.status(), Status::Running);
        });
        assert_eq!(task.status(), Status::Pending);
        assert!(task.runnable());

        assert!(task.call());
        assert_eq!(task.status(), Status::Done);
        assert!(!task.runnable());
    }

    #[test]
    fn a_done_task_never_reruns() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let mut task = Task::new(move |_| counter.set(counter.get() + 1));

        assert!(task.call());
        assert!(!task.call());
        assert_eq!(runs.get(), 1);
        assert_eq!(task.status(), Status::Done);
    }

    #[test]
    fn panicking_work_still_lands_done() {
        let mut task = Task::new(|_| panic!("boom"));
        let result = catch_unwind(AssertUnwindSafe(|| task.call()));
        assert!(result.is_err());
        assert_eq!(task.status(), Status::Done);
        assert!(!task.call());
    }

    #[test]
    fn timed_task_refuses_to_run_early() {
        let mut task = Timed::after(Duration::from_millis(20), |_| {});
        assert!(!task.runnable());
        assert!(!task.call());
        assert_eq!(task.status(), Status::Pending);

        thread::sleep(Duration::from_millis(25));
        assert!(task.runnable());
        assert!(task.call());
        assert_eq!(task.status(), Status::Done);
    }

    #[test]
    fn trigger_time_is_fixed_at_construction() {
        let before = Instant::now();
        let task = Timed::after(Duration::from_secs(1), |_| {});
        assert!(task.trigger_time() >= before + Duration::from_secs(1));

        let when = Instant::now() + Duration::from_secs(5);
        let task = Timed::at(when, |_| {});
        assert_eq!(task.trigger_time(), when);
    }
}
