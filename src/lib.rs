//! A single-threaded callback reactor.
//!
//! Register interest in readiness events on raw fds, schedule one-shot
//! timers and next-tick work, and drive everything from one [`Reactor::run`]
//! loop. Two interchangeable multiplexing backends sit behind the same
//! [`Backend`] trait: [`Select`] polls readiness portably via `poll(2)`,
//! [`Notify`] rides the kernel's event-notification facility via `mio`.
//! [`Engine::detect`] picks between them once per process.
//!
//! The ordered structures underneath ([`LinkMap`], [`SortedLinkMap`],
//! [`timers::Queue`]) and the deferred-task layer ([`Task`], [`TaskQueue`])
//! are exported too; they are useful on their own.

#![warn(rust_2018_idioms)]

mod list;
mod reactor;
mod sorted;
mod task;
mod tasks;
pub mod timers;

pub use list::{Iter, LinkMap, NodeRef};
pub use reactor::{Backend, Engine, Event, Interest, IoCallback, Notify, Reactor, Select};
pub use sorted::SortedLinkMap;
pub use task::{Status, Task, Timed};
pub use tasks::{TaskId, TaskQueue};
