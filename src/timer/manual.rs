//! # Manually advanced timer driver.
//!
//! [`ManualDriver`] keeps a virtual clock that only moves when the host calls
//! [`ManualDriver::advance`]. It is the deterministic driver used by tests, and
//! fits hosts that already run their own frame or tick loop.
//!
//! ## Firing order
//! Due callbacks fire in `(deadline, schedule order)` order. While a callback
//! runs, the clock reads its deadline, so work it schedules lands relative to
//! that instant and fires within the same `advance` if it falls inside the
//! advanced range.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//! use lifeline::{ManualDriver, TimerDriver};
//!
//! let clock = ManualDriver::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let f = fired.clone();
//! clock.schedule(Duration::from_millis(100), Box::new(move || f.store(true, Ordering::SeqCst)));
//!
//! clock.advance(Duration::from_millis(99));
//! assert!(!fired.load(Ordering::SeqCst));
//! clock.advance(Duration::from_millis(1));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;

use super::{Callback, TimerDriver, TimerId};

type Slot = (Duration, u64);

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    queue: BTreeMap<Slot, (TimerId, Callback)>,
    index: HashMap<TimerId, Slot>,
}

/// Virtual-clock timer driver.
#[derive(Default)]
pub struct ManualDriver {
    state: Mutex<ManualState>,
}

impl ManualDriver {
    /// Creates a driver whose clock reads zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of callbacks waiting to fire.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Moves the clock forward by `by`, firing every callback that becomes due.
    ///
    /// Returns the number of callbacks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;
        while let Some(callback) = self.pop_due(target) {
            callback();
            fired += 1;
        }
        let mut state = self.state.lock();
        state.now = state.now.max(target);
        fired
    }

    /// Fires callbacks that are already due (zero-delay work) without moving the clock.
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Removes the earliest callback due at or before `until` and moves the clock to it.
    fn pop_due(&self, until: Duration) -> Option<Callback> {
        let mut state = self.state.lock();
        let (&slot, _) = state.queue.first_key_value()?;
        if slot.0 > until {
            return None;
        }
        let (id, callback) = state.queue.remove(&slot)?;
        state.index.remove(&id);
        state.now = state.now.max(slot.0);
        Some(callback)
    }
}

impl TimerDriver for ManualDriver {
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerId {
        let id = TimerId::next();
        let mut state = self.state.lock();
        state.seq += 1;
        let slot = (state.now + delay, state.seq);
        state.queue.insert(slot, (id, callback));
        state.index.insert(id, slot);
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        // the callback is dropped after the lock is released; it may own the
        // last handle of an owner whose teardown cancels more timers
        let removed = {
            let mut state = self.state.lock();
            let slot = state.index.remove(&id);
            slot.and_then(|slot| state.queue.remove(&slot))
        };
        removed.is_some()
    }
}
