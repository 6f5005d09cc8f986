//! # Runtime events emitted by owners, their poll tasks and the poll registry.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Timer events**: delayed tasks, debounces and throttles
//! - **Poll events**: registration, ticks, queued continuations, advances
//! - **Teardown events**: disposables and owner destruction
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, owner,
//! task name, timer id and delay.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lifeline::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::DebounceScheduled)
//!     .with_name("save")
//!     .with_delay(Duration::from_millis(300));
//!
//! assert_eq!(ev.kind, EventKind::DebounceScheduled);
//! assert_eq!(ev.name.as_deref(), Some("save"));
//! assert_eq!(ev.delay_ms, Some(300));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::OwnerId;
use crate::timer::TimerId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Timer events ===
    /// A delayed task was scheduled with `run_task`.
    ///
    /// Sets: `owner`, `timer`, `delay_ms`
    TaskScheduled,

    /// A delayed task fired (its handle already left the pending set).
    ///
    /// Sets: `owner`, `timer`
    TaskFired,

    /// A pending delayed task was canceled (explicitly or by destroy).
    ///
    /// Sets: `owner`, `timer`
    TaskCanceled,

    /// A debounce window was opened or extended.
    ///
    /// Sets: `owner`, `name`, `timer`, `delay_ms`
    DebounceScheduled,

    /// A debounce window closed and its latest action ran.
    ///
    /// Sets: `owner`, `name`
    DebounceFired,

    /// A pending debounce was canceled (explicitly or by destroy).
    ///
    /// Sets: `owner`, `name`, `timer`
    DebounceCanceled,

    /// A throttled action ran on the leading edge of a window.
    ///
    /// Sets: `owner`, `name`, `delay_ms` (window length)
    ThrottleInvoked,

    /// A throttled call landed inside an open window and was dropped.
    ///
    /// Sets: `owner`, `name`
    ThrottleSuppressed,

    // === Poll events ===
    /// A poll task was started (labeled or not).
    ///
    /// Sets: `owner`, `name` (label, if any)
    PollRegistered,

    /// A poll task callback is about to run.
    ///
    /// Sets: `owner`, `name` (label, if any)
    PollTick,

    /// A poll continuation was parked for `advance` (test-control mode).
    ///
    /// Sets: `name`
    PollQueued,

    /// A parked poll continuation was released by `advance`.
    ///
    /// Sets: `name`
    PollAdvanced,

    /// A poll label was cleared.
    ///
    /// Sets: `name`
    PollCanceled,

    // === Teardown events ===
    /// A disposable was run (individually or during destroy).
    ///
    /// Sets: `owner`
    DisposableRun,

    /// A disposable panicked during destroy; the panic was isolated.
    ///
    /// Sets: `owner`, `reason`
    DisposablePanicked,

    /// An owner's destroy hook completed.
    ///
    /// Sets: `owner`
    OwnerDestroyed,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `name` (subscriber name), `reason` (panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `name` (subscriber name), `reason` ("full" or "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Owner the event belongs to, if applicable.
    pub owner: Option<OwnerId>,
    /// Debounce/throttle name, poll label or subscriber name.
    pub name: Option<Arc<str>>,
    /// Timer handle involved, if any.
    pub timer: Option<TimerId>,
    /// Delay or window length in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (panic payloads, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            owner: None,
            name: None,
            timer: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches the owning registry.
    #[inline]
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Attaches a name or label.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a label only when one is present.
    #[inline]
    pub fn with_label(self, label: Option<&str>) -> Self {
        match label {
            Some(l) => self.with_name(l),
            None => self,
        }
    }

    /// Attaches a timer handle.
    #[inline]
    pub fn with_timer(mut self, timer: TimerId) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_name(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_name(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}
