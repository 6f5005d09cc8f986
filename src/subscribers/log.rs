//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [task-scheduled] owner=owner#1 timer=timer#4 delay_ms=100
//! [task-canceled] owner=owner#1 timer=timer#4
//! [debounce-scheduled] owner=owner#1 name="save" timer=timer#5 delay_ms=300
//! [throttle-suppressed] owner=owner#1 name="scroll"
//! [poll-queued] label="users#refresh"
//! [owner-destroyed] owner=owner#1
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn owner(e: &Event) -> String {
    e.owner.map(|o| o.to_string()).unwrap_or_else(|| "-".into())
}

fn timer(e: &Event) -> String {
    e.timer.map(|t| t.to_string()).unwrap_or_else(|| "-".into())
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::TaskScheduled => {
                println!(
                    "[task-scheduled] owner={} timer={} delay_ms={:?}",
                    owner(e),
                    timer(e),
                    e.delay_ms
                );
            }
            EventKind::TaskFired => {
                println!("[task-fired] owner={} timer={}", owner(e), timer(e));
            }
            EventKind::TaskCanceled => {
                println!("[task-canceled] owner={} timer={}", owner(e), timer(e));
            }
            EventKind::DebounceScheduled => {
                println!(
                    "[debounce-scheduled] owner={} name={:?} timer={} delay_ms={:?}",
                    owner(e),
                    e.name,
                    timer(e),
                    e.delay_ms
                );
            }
            EventKind::DebounceFired => {
                println!("[debounce-fired] owner={} name={:?}", owner(e), e.name);
            }
            EventKind::DebounceCanceled => {
                println!("[debounce-canceled] owner={} name={:?}", owner(e), e.name);
            }
            EventKind::ThrottleInvoked => {
                println!(
                    "[throttle-invoked] owner={} name={:?} window_ms={:?}",
                    owner(e),
                    e.name,
                    e.delay_ms
                );
            }
            EventKind::ThrottleSuppressed => {
                println!("[throttle-suppressed] owner={} name={:?}", owner(e), e.name);
            }
            EventKind::PollRegistered => {
                println!("[poll-registered] owner={} label={:?}", owner(e), e.name);
            }
            EventKind::PollTick => {
                println!("[poll-tick] owner={} label={:?}", owner(e), e.name);
            }
            EventKind::PollQueued => {
                println!("[poll-queued] label={:?}", e.name);
            }
            EventKind::PollAdvanced => {
                println!("[poll-advanced] label={:?}", e.name);
            }
            EventKind::PollCanceled => {
                println!("[poll-canceled] label={:?}", e.name);
            }
            EventKind::DisposableRun => {
                println!("[disposable-run] owner={}", owner(e));
            }
            EventKind::DisposablePanicked => {
                println!(
                    "[disposable-panicked] owner={} info={}",
                    owner(e),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
            EventKind::OwnerDestroyed => {
                println!("[owner-destroyed] owner={}", owner(e));
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] subscriber={:?} reason={:?}",
                    e.name, e.reason
                );
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={} info={}",
                    e.name.as_deref().unwrap_or("unknown"),
                    e.reason.as_deref().unwrap_or("unknown"),
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
