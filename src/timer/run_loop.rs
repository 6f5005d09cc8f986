//! # RunLoop: keyed debounce and throttle windows over a timer driver.
//!
//! [`RunLoop`] is the timer adapter owners talk to. Plain delays go straight to
//! the driver; debounces and throttles are tracked per [`TaskKey`] so that calls
//! for the same key collapse.
//!
//! ## Debounce
//! ```text
//! debounce(key, wait, cb)
//!   ├─ schedule(wait, cb) ─► window[key] = { seq, timer }
//!   └─ window was open for key? ─► cancel its timer (old callback is dropped)
//!
//! open_debounce(key, wait, cb)     same, but hands the replaced timer back
//!                                  instead of canceling it
//!
//! timer fires ─► window[key].seq still ours? ─► remove window ─► cb()
//! ```
//!
//! ## Throttle
//! ```text
//! throttle(key, wait, cb)
//!   ├─ window open for key? ─► suppressed, return false
//!   └─ open window, schedule(wait, close window) ─► cb() now ─► return true
//! ```
//! Suppressed calls are dropped; no trailing call is replayed when the window closes.
//!
//! ## Rules
//! - The window table lock is never held while a user callback runs or is dropped.
//! - Window sequence numbers make a stale timer (one that raced its own
//!   cancellation on a multi-threaded driver) a no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{Callback, TimerDriver, TimerId};
use crate::core::OwnerId;

/// Identity of a debounce or throttle window: one per (owner, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    /// Owner the window belongs to.
    pub owner: OwnerId,
    /// Name chosen by the owner.
    pub name: Arc<str>,
}

impl TaskKey {
    /// Builds a key for `owner` and `name`.
    pub fn new(owner: OwnerId, name: impl Into<Arc<str>>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    seq: u64,
    timer: TimerId,
}

#[derive(Default)]
struct Windows {
    seq: u64,
    debounces: HashMap<TaskKey, Window>,
    throttles: HashMap<TaskKey, Window>,
}

impl Windows {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Timer adapter with keyed debounce/throttle windows.
pub struct RunLoop {
    driver: Arc<dyn TimerDriver>,
    windows: Arc<Mutex<Windows>>,
}

impl RunLoop {
    /// Creates a run loop over `driver`.
    pub fn new(driver: Arc<dyn TimerDriver>) -> Self {
        Self {
            driver,
            windows: Arc::new(Mutex::new(Windows::default())),
        }
    }

    /// Runs `callback` after `delay`.
    pub fn later(&self, delay: Duration, callback: Callback) -> TimerId {
        self.driver.schedule(delay, callback)
    }

    /// Cancels a timer returned by [`later`](Self::later) or [`debounce`](Self::debounce).
    ///
    /// Unknown or already fired ids are ignored. Returns `true` if a pending
    /// callback was dropped.
    pub fn cancel(&self, id: TimerId) -> bool {
        let canceled = self.driver.cancel(id);
        self.windows.lock().debounces.retain(|_, w| w.timer != id);
        canceled
    }

    /// Opens or extends the debounce window for `key`.
    ///
    /// Any callback still waiting in the window is replaced by `callback`, and the
    /// wait restarts from now. Returns the timer backing the new window.
    pub fn debounce(&self, key: TaskKey, wait: Duration, callback: Callback) -> TimerId {
        let (timer, replaced) = self.open_debounce(key, wait, callback);
        if let Some(replaced) = replaced {
            self.driver.cancel(replaced);
        }
        timer
    }

    /// Like [`debounce`](Self::debounce), but leaves the replaced window's timer
    /// armed and returns it.
    ///
    /// The replaced timer is already stale (its callback is a no-op), but it
    /// still owns the previous callback until the caller passes it to
    /// [`cancel`](Self::cancel). Callers holding their own lock use this to drop
    /// that callback after unlocking.
    pub(crate) fn open_debounce(
        &self,
        key: TaskKey,
        wait: Duration,
        callback: Callback,
    ) -> (TimerId, Option<TimerId>) {
        let mut windows = self.windows.lock();
        let prev = windows.debounces.remove(&key);
        let seq = windows.next_seq();

        let table = Arc::clone(&self.windows);
        let fire_key = key.clone();
        let timer = self.driver.schedule(
            wait,
            Box::new(move || {
                let current = {
                    let mut windows = table.lock();
                    let ours = windows
                        .debounces
                        .get(&fire_key)
                        .is_some_and(|w| w.seq == seq);
                    if ours {
                        windows.debounces.remove(&fire_key);
                    }
                    ours
                };
                if current {
                    callback();
                }
            }),
        );
        windows.debounces.insert(key, Window { seq, timer });
        (timer, prev.map(|w| w.timer))
    }

    /// Invokes `callback` immediately unless a throttle window for `key` is open.
    ///
    /// Returns `true` if the callback ran.
    pub fn throttle<F>(&self, key: TaskKey, wait: Duration, callback: F) -> bool
    where
        F: FnOnce(),
    {
        {
            let mut windows = self.windows.lock();
            if windows.throttles.contains_key(&key) {
                return false;
            }
            let seq = windows.next_seq();

            let table = Arc::clone(&self.windows);
            let close_key = key.clone();
            let timer = self.driver.schedule(
                wait,
                Box::new(move || {
                    let mut windows = table.lock();
                    if windows
                        .throttles
                        .get(&close_key)
                        .is_some_and(|w| w.seq == seq)
                    {
                        windows.throttles.remove(&close_key);
                    }
                }),
            );
            windows.throttles.insert(key, Window { seq, timer });
        }
        callback();
        true
    }

    /// Closes every window held by `owner`, canceling their timers.
    ///
    /// Returns the number of windows closed.
    pub fn release_owner(&self, owner: OwnerId) -> usize {
        let timers: Vec<TimerId> = {
            let mut guard = self.windows.lock();
            let windows = &mut *guard;
            let mut timers = Vec::new();
            for table in [&mut windows.debounces, &mut windows.throttles] {
                table.retain(|key, w| {
                    if key.owner == owner {
                        timers.push(w.timer);
                        false
                    } else {
                        true
                    }
                });
            }
            timers
        };
        for timer in &timers {
            self.driver.cancel(*timer);
        }
        timers.len()
    }

    /// Number of open debounce windows.
    pub fn debounce_windows(&self) -> usize {
        self.windows.lock().debounces.len()
    }

    /// Number of open throttle windows.
    pub fn throttle_windows(&self) -> usize {
        self.windows.lock().throttles.len()
    }
}
