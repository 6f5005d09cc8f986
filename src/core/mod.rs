//! Runtime core: owners and the scheduler that creates them.
//!
//! The public API from this module is [`Scheduler`] (shared plumbing, built
//! with [`SchedulerBuilder`]) and [`Lifeline`] (one task registry per owner).
//!
//! Internal modules:
//! - [`lifeline`]: per-owner timers, debounces, throttles, polls and the destroy sequence;
//! - [`disposables`]: id-keyed teardown actions drained newest first;
//! - [`scheduler`]: shared run loop, poll registry, bus and subscriber listener;
//! - [`builder`]: assembles a scheduler from config and injected collaborators.

mod builder;
mod disposables;
mod lifeline;
mod scheduler;

pub use builder::SchedulerBuilder;
pub use disposables::DisposableId;
pub use lifeline::{DestroyGuard, Lifeline, OwnerId};
pub use scheduler::Scheduler;
