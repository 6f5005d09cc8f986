//! # Poll continuation.
//!
//! A poll task is a callback that receives a [`Next`] every time it runs. Calling
//! [`Next::call`] asks for another run; what that means depends on the mode the
//! task was started in:
//!
//! | mode          | label   | `next.call()`                                      |
//! |---------------|---------|----------------------------------------------------|
//! | live          | any     | runs the callback again, synchronously             |
//! | test-control  | `Some`  | parks the tick until `advance(label)`              |
//! | test-control  | `None`  | nothing; the chain stops after its first run       |
//!
//! In every mode `next` is inert once the owner is destroyed or the label was
//! canceled.

use std::sync::Arc;

use crate::core::OwnerId;
use crate::events::{Bus, Event, EventKind};

use super::PollRegistry;

pub(crate) type PollCallback = Box<dyn Fn(Next) + Send + Sync>;
pub(crate) type Liveness = Box<dyn Fn() -> bool + Send + Sync>;

/// One started poll task.
pub(crate) struct PollTask {
    pub(crate) owner: OwnerId,
    pub(crate) label: Option<Arc<str>>,
    pub(crate) ticket: u64,
    pub(crate) live: bool,
    pub(crate) callback: PollCallback,
    pub(crate) owner_alive: Liveness,
    pub(crate) registry: Arc<PollRegistry>,
    pub(crate) bus: Bus,
}

impl PollTask {
    /// Runs the callback once with a fresh continuation.
    pub(crate) fn tick(self: &Arc<Self>) {
        self.bus.publish(
            Event::new(EventKind::PollTick)
                .with_owner(self.owner)
                .with_label(self.label.as_deref()),
        );
        (self.callback)(Next {
            task: Arc::clone(self),
        });
    }

    fn still_registered(&self) -> bool {
        match &self.label {
            Some(label) => self.registry.holds(label, self.ticket),
            None => true,
        }
    }
}

/// Continuation handed to a poll callback; call it to request the next tick.
///
/// `Next` is cheap to clone and can be moved into a delayed task:
/// ```rust
/// use std::time::Duration;
/// use lifeline::{Config, ManualDriver, Scheduler};
/// # use std::sync::Arc;
/// # let clock = Arc::new(ManualDriver::new());
/// # let scheduler = Scheduler::builder(Config::default()).with_driver(clock.clone()).build()?;
/// let owner = scheduler.lifeline();
/// let timers = owner.clone();
///
/// owner.poll_task(None, move |next| {
///     // refresh something, then come back in a second
///     let _ = timers.run_task(Duration::from_secs(1), move || next.call());
/// })?;
/// # Ok::<(), lifeline::LifelineError>(())
/// ```
#[derive(Clone)]
pub struct Next {
    task: Arc<PollTask>,
}

impl Next {
    /// Requests the next tick of the poll task.
    pub fn call(&self) {
        let task = &self.task;
        if !(task.owner_alive)() || !task.still_registered() {
            return;
        }
        match (&task.label, task.live) {
            (_, true) => task.tick(),
            (Some(label), false) => {
                let parked = Arc::clone(task);
                task.registry
                    .enqueue(label, task.ticket, Box::new(move || parked.tick()));
            }
            (None, false) => {}
        }
    }

    /// Label of the poll task, if it has one.
    pub fn label(&self) -> Option<&str> {
        self.task.label.as_deref()
    }
}
