//! # lifeline
//!
//! **Lifeline** is a lifecycle-bound task scheduler for Rust.
//!
//! Short-lived objects (UI components, session workers, connection handlers)
//! schedule delayed, debounced, throttled or polling work through a
//! [`Lifeline`]. When the owner is destroyed, every pending unit of work is
//! canceled and every registered teardown action runs exactly once, so nothing
//! fires after its owner is gone.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Lifeline   │   │   Lifeline   │   │   Lifeline   │
//!     │  (owner #1)  │   │  (owner #2)  │   │  (owner #3)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Scheduler (shared plumbing)                                      │
//! │  - RunLoop (keyed debounce/throttle windows over a TimerDriver)   │
//! │  - PollRegistry (unique labels, parked test-control ticks)        │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────────────────────────────────────┬─────────┘
//!        ▼                                                  ▼
//!   dyn TimerDriver                                ┌────────────────────┐
//!   ├─ TokioDriver  (tokio::time)                  │ subscriber_listener│
//!   └─ ManualDriver (virtual clock)                └─────────┬──────────┘
//!                                                  ┌─────────┼─────────┐
//!                                                  ▼         ▼         ▼
//!                                               worker1   worker2   workerN
//! ```
//!
//! ### Per-owner lifecycle
//! ```text
//! scheduler.lifeline() ─► Lifeline
//!   ├─ run_task / cancel_task             pending timers
//!   ├─ debounce_task / cancel_debounce    pending debounces (latest action wins)
//!   ├─ throttle_task                      leading edge only
//!   ├─ poll_task / cancel_poll            poll labels (next.call() drives ticks)
//!   └─ register_disposable / run_disposable
//!
//! destroy() (or last handle dropped)
//!   ├─ cancel timers, cancel debounces, close throttle windows
//!   ├─ clear poll labels and parked ticks
//!   ├─ run disposables, newest first
//!   └─ every later scheduling call fails with LifelineError::Destroyed
//! ```
//!
//! ## Features
//! | Area              | Description                                                          |
//! |-------------------|----------------------------------------------------------------------|
//! | **Drivers**       | [`TokioDriver`] for production, [`ManualDriver`] for tests and frame loops |
//! | **Polling**       | [`Next`] continuations, [`PollMode::TestControl`] stepped by `advance` |
//! | **Observability** | [`Event`]s on a [`Bus`], [`Subscribe`] workers, optional `LogWriter` |
//! | **Errors**        | [`LifelineError`], returned synchronously, never for cancellation    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//! use lifeline::{Config, ManualDriver, Scheduler};
//!
//! let clock = Arc::new(ManualDriver::new());
//! let scheduler = Scheduler::builder(Config::test_control())
//!     .with_driver(clock.clone())
//!     .build()?;
//!
//! let owner = scheduler.lifeline();
//! let saves = Arc::new(AtomicUsize::new(0));
//! for _ in 0..3 {
//!     let saves = saves.clone();
//!     owner.debounce_task("save", Duration::from_millis(300), move || {
//!         saves.fetch_add(1, Ordering::SeqCst);
//!     })?;
//!     clock.advance(Duration::from_millis(100));
//! }
//! clock.advance(Duration::from_millis(200));
//! assert_eq!(saves.load(Ordering::SeqCst), 1);
//!
//! let ticks = Arc::new(AtomicUsize::new(0));
//! let t = ticks.clone();
//! owner.poll_task(Some("refresh"), move |next| {
//!     t.fetch_add(1, Ordering::SeqCst);
//!     next.call();
//! })?;
//! scheduler.advance("refresh")?;
//! assert_eq!(ticks.load(Ordering::SeqCst), 2);
//!
//! owner.destroy();
//! assert!(scheduler.advance("refresh").is_err());
//! # Ok::<(), lifeline::LifelineError>(())
//! ```

mod config;
mod core;
mod error;
mod events;
mod poll;
mod subscribers;
mod timer;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{DestroyGuard, DisposableId, Lifeline, OwnerId, Scheduler, SchedulerBuilder};
pub use error::{AdvanceRefusal, LifelineError};
pub use events::{Bus, Event, EventKind};
pub use poll::{Next, PollMode, PollRegistry, ShouldPoll};
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
pub use subscribers::{Subscribe, SubscriberSet};
pub use timer::{Callback, ManualDriver, RunLoop, TaskKey, TimerDriver, TimerId, TokioDriver};
