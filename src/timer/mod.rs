//! Timer primitives: the driver seam and the keyed run loop built on top of it.
//!
//! A [`TimerDriver`] is the only thing that actually waits. It knows how to run a
//! callback after a delay and how to cancel it. Everything else in the crate is
//! bookkeeping layered over that contract:
//!
//! ```text
//!   Lifeline ──► RunLoop ──► dyn TimerDriver
//!                  │             ├─ TokioDriver  (tokio::time + CancellationToken)
//!                  │             └─ ManualDriver (virtual clock, advanced by hand)
//!                  └─ keyed debounce / throttle windows
//! ```
//!
//! ## Driver contract
//! - `schedule` returns immediately with a fresh [`TimerId`].
//! - A callback runs at most once, and never after `cancel` returned `true` for it.
//! - `cancel` on an unknown, fired or already canceled id returns `false` and does nothing.
//! - Drivers never invoke callbacks from inside `schedule` or `cancel`.

mod manual;
mod run_loop;
mod tokio_driver;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub use manual::ManualDriver;
pub use run_loop::{RunLoop, TaskKey};
pub use tokio_driver::TokioDriver;

/// Type-erased timer callback.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Global timer id counter; ids are unique across all drivers in the process.
static TIMER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Allocates the next process-unique id.
    pub fn next() -> Self {
        Self(TIMER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (for logs).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Delayed-callback facility consumed by the scheduler.
pub trait TimerDriver: Send + Sync + 'static {
    /// Runs `callback` once after `delay`, unless canceled first.
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerId;

    /// Cancels a pending callback. Returns `true` if it was still pending.
    fn cancel(&self, id: TimerId) -> bool;
}
