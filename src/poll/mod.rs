//! Poll coordination: self-rescheduling work that tests can step by hand.
//!
//! ## Contents
//! - [`PollRegistry`] label uniqueness and parked test-control continuations
//! - [`PollMode`] live vs. test-control operation
//! - [`Next`] the continuation handed to poll callbacks
//!
//! ## Lifecycle
//! ```text
//! Lifeline::poll_task(label, cb)
//!   ├─► registry.register(label)      (DuplicateLabel if held)
//!   ├─► live = registry.should_poll()
//!   └─► cb(next)                      (first tick, synchronous)
//!
//! next.call()
//!   ├─ live          ─► cb(next)
//!   ├─ test, label   ─► registry.enqueue(label, tick) ─► advance(label) ─► cb(next)
//!   └─ test, none    ─► (stop)
//!
//! cancel_poll(label) / owner destroy ─► registry.cancel(label)
//! ```

mod next;
mod registry;

pub(crate) use next::PollTask;
pub use next::Next;
pub use registry::{PollMode, PollRegistry, ShouldPoll};
