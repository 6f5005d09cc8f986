//! # Poll label registry and test-control queue.
//!
//! [`PollRegistry`] is the process-lifetime object shared by every owner of a
//! [`Scheduler`](crate::Scheduler). It holds two things per label:
//!
//! ```text
//! label ──► Slot { ticket, queued: Option<continuation> }
//!             │        └─ parked "run next tick" (test-control mode only)
//!             └─ identifies the poll task currently holding the label
//! ```
//!
//! ## Rules
//! - A label is held by at most one live poll task; registering a held label fails.
//! - Clearing a label also drops its parked continuation.
//! - Continuations are dropped and invoked outside the registry lock, so they may
//!   re-enter the registry (register, cancel, advance).
//! - Tickets let an owner clear only the registration it made itself, even if the
//!   label was cleared and re-registered by someone else in between.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{AdvanceRefusal, LifelineError};
use crate::events::{Bus, Event, EventKind};

/// How poll tasks continue after their callback calls `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollMode {
    /// `next` re-runs the callback (production).
    #[default]
    Live,
    /// `next` parks the tick until [`PollRegistry::advance`] releases it.
    TestControl,
}

/// Override for the "should poll live" decision.
pub type ShouldPoll = Arc<dyn Fn() -> bool + Send + Sync>;

pub(crate) type Continuation = Box<dyn FnOnce() + Send>;

struct Slot {
    ticket: u64,
    queued: Option<Continuation>,
}

#[derive(Default)]
struct Slots {
    next_ticket: u64,
    map: HashMap<String, Slot>,
}

/// Registry of poll labels and parked test-control continuations.
pub struct PollRegistry {
    mode: PollMode,
    should_poll: RwLock<Option<ShouldPoll>>,
    slots: Mutex<Slots>,
    bus: Bus,
}

impl PollRegistry {
    /// Creates an empty registry operating in `mode`.
    pub fn new(mode: PollMode, bus: Bus) -> Self {
        Self {
            mode,
            should_poll: RwLock::new(None),
            slots: Mutex::new(Slots::default()),
            bus,
        }
    }

    /// The mode the registry was created with.
    pub fn mode(&self) -> PollMode {
        self.mode
    }

    /// Replaces the "should poll live" decision; `None` restores [`mode`](Self::mode).
    ///
    /// The decision is taken once per poll task, when it is started.
    pub fn set_should_poll(&self, predicate: Option<ShouldPoll>) {
        *self.should_poll.write() = predicate;
    }

    /// Whether newly started poll tasks run live.
    pub fn should_poll(&self) -> bool {
        let predicate = self.should_poll.read().clone();
        match predicate {
            Some(predicate) => predicate(),
            None => self.mode == PollMode::Live,
        }
    }

    /// Claims `label`, returning the ticket of the new registration.
    pub(crate) fn register(&self, label: &str) -> Result<u64, LifelineError> {
        let mut slots = self.slots.lock();
        if slots.map.contains_key(label) {
            return Err(LifelineError::DuplicateLabel {
                label: label.to_string(),
            });
        }
        slots.next_ticket += 1;
        let ticket = slots.next_ticket;
        slots.map.insert(
            label.to_string(),
            Slot {
                ticket,
                queued: None,
            },
        );
        Ok(ticket)
    }

    /// Clears `label` and any parked continuation. Unknown labels are ignored.
    ///
    /// Returns `true` if the label was registered.
    pub fn cancel(&self, label: &str) -> bool {
        let removed = self.slots.lock().map.remove(label);
        self.finish_cancel(label, removed)
    }

    /// Clears `label` only if it is still held by the registration `ticket`.
    pub(crate) fn cancel_ticket(&self, label: &str, ticket: u64) -> bool {
        let removed = {
            let mut slots = self.slots.lock();
            if slots.map.get(label).is_some_and(|s| s.ticket == ticket) {
                slots.map.remove(label)
            } else {
                None
            }
        };
        self.finish_cancel(label, removed)
    }

    fn finish_cancel(&self, label: &str, removed: Option<Slot>) -> bool {
        match removed {
            Some(_slot) => {
                self.bus
                    .publish(Event::new(EventKind::PollCanceled).with_name(label));
                true
            }
            None => false,
        }
    }

    /// Whether `label` is still held by the registration `ticket`.
    pub(crate) fn holds(&self, label: &str, ticket: u64) -> bool {
        self.slots
            .lock()
            .map
            .get(label)
            .is_some_and(|s| s.ticket == ticket)
    }

    /// Parks `continuation` under `label` if the registration `ticket` still holds it.
    ///
    /// A continuation parked earlier and never advanced is replaced.
    pub(crate) fn enqueue(&self, label: &str, ticket: u64, continuation: Continuation) -> bool {
        let (queued, replaced) = {
            let mut slots = self.slots.lock();
            match slots.map.get_mut(label) {
                Some(slot) if slot.ticket == ticket => (true, slot.queued.replace(continuation)),
                _ => (false, Some(continuation)),
            }
        };
        drop(replaced);
        if queued {
            self.bus
                .publish(Event::new(EventKind::PollQueued).with_name(label));
        }
        queued
    }

    /// Runs the continuation parked under `label`.
    ///
    /// Fails with [`LifelineError::UnknownLabel`] if no poll task holds the label,
    /// or if its callback has not called `next` since the last tick.
    pub fn advance(&self, label: &str) -> Result<(), LifelineError> {
        let refused = |reason| LifelineError::UnknownLabel {
            label: label.to_string(),
            reason,
        };
        let continuation = {
            let mut slots = self.slots.lock();
            let slot = slots
                .map
                .get_mut(label)
                .ok_or_else(|| refused(AdvanceRefusal::NotRegistered))?;
            slot.queued
                .take()
                .ok_or_else(|| refused(AdvanceRefusal::NotQueued))?
        };
        self.bus
            .publish(Event::new(EventKind::PollAdvanced).with_name(label));
        continuation();
        Ok(())
    }

    /// Whether a poll task holds `label`.
    pub fn is_registered(&self, label: &str) -> bool {
        self.slots.lock().map.contains_key(label)
    }

    /// Whether a continuation is parked under `label`.
    pub fn is_queued(&self, label: &str) -> bool {
        self.slots
            .lock()
            .map
            .get(label)
            .is_some_and(|s| s.queued.is_some())
    }

    /// Sorted list of registered labels.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.slots.lock().map.keys().cloned().collect();
        labels.sort_unstable();
        labels
    }

    /// Clears every label and parked continuation (between test cases).
    pub fn reset(&self) {
        let drained = std::mem::take(&mut self.slots.lock().map);
        drop(drained);
    }
}
