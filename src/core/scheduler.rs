//! # Scheduler: shared timer, poll and event plumbing for many owners.
//!
//! One [`Scheduler`] per process (or per test) owns the pieces every owner
//! shares and hands out [`Lifeline`]s:
//!
//! ```text
//! Scheduler
//! ├─ RunLoop       ─► dyn TimerDriver   (TokioDriver by default)
//! ├─ PollRegistry  labels + parked test-control ticks
//! ├─ Bus           events from every owner
//! └─ listener      Bus ─► SubscriberSet ─► [queue S1] … [queue SN]   (only with subscribers)
//!
//! scheduler.lifeline() ─► Lifeline (one per owner)
//! ```
//!
//! Dropping the scheduler stops the subscriber listener; owners already handed
//! out keep their own references to the run loop and the registry.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::builder::SchedulerBuilder;
use super::lifeline::Lifeline;
use crate::config::Config;
use crate::error::LifelineError;
use crate::events::Bus;
use crate::poll::{PollRegistry, ShouldPoll};
use crate::subscribers::SubscriberSet;
use crate::timer::RunLoop;

/// Factory and shared context for [`Lifeline`]s.
pub struct Scheduler {
    cfg: Config,
    bus: Bus,
    run_loop: Arc<RunLoop>,
    polls: Arc<PollRegistry>,
    listener: CancellationToken,
}

impl Scheduler {
    /// Starts building a scheduler with `cfg`.
    pub fn builder(cfg: Config) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        run_loop: Arc<RunLoop>,
        polls: Arc<PollRegistry>,
    ) -> Self {
        Self {
            cfg,
            bus,
            run_loop,
            polls,
            listener: CancellationToken::new(),
        }
    }

    /// Spawns the task forwarding bus events to `subs` until the scheduler is dropped.
    pub(super) fn subscriber_listener(&self, subs: SubscriberSet, rt: &Handle) {
        let mut rx = self.bus.subscribe();
        let stop = self.listener.clone();
        rt.spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => subs.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            subs.shutdown().await;
        });
    }

    /// Creates the task registry for a new owner.
    pub fn lifeline(&self) -> Lifeline {
        Lifeline::new(
            Arc::clone(&self.run_loop),
            Arc::clone(&self.polls),
            self.bus.clone(),
            self.cfg.isolate_disposable_panics,
        )
    }

    /// Releases the poll tick parked under `label` (test-control mode).
    ///
    /// See [`PollRegistry::advance`].
    pub fn advance(&self, label: &str) -> Result<(), LifelineError> {
        self.polls.advance(label)
    }

    /// Overrides the "should poll live" decision for poll tasks started from now on.
    pub fn set_should_poll(&self, predicate: Option<ShouldPoll>) {
        self.polls.set_should_poll(predicate);
    }

    /// Configuration the scheduler was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared by every owner of this scheduler.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Poll registry shared by every owner of this scheduler.
    pub fn polls(&self) -> &Arc<PollRegistry> {
        &self.polls
    }

    /// Timer adapter shared by every owner of this scheduler.
    pub fn run_loop(&self) -> &Arc<RunLoop> {
        &self.run_loop
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}
