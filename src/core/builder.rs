use std::sync::Arc;

use tokio::runtime::Handle;

use super::scheduler::Scheduler;
use crate::{
    config::Config,
    error::LifelineError,
    events::Bus,
    poll::PollRegistry,
    subscribers::{Subscribe, SubscriberSet},
    timer::{RunLoop, TimerDriver, TokioDriver},
};

/// Builder for constructing a [`Scheduler`] with optional collaborators.
pub struct SchedulerBuilder {
    cfg: Config,
    driver: Option<Arc<dyn TimerDriver>>,
    polls: Option<Arc<PollRegistry>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            driver: None,
            polls: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the timer driver.
    ///
    /// Defaults to a [`TokioDriver`] on the current runtime.
    pub fn with_driver(mut self, driver: Arc<dyn TimerDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Uses an existing poll registry instead of creating one from
    /// `Config::poll_mode`.
    ///
    /// Schedulers sharing a registry share label uniqueness and parked ticks.
    /// The registry keeps publishing its poll events on the bus it was created with.
    pub fn with_poll_registry(mut self, polls: Arc<PollRegistry>) -> Self {
        self.polls = Some(polls);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive scheduler events through dedicated workers with
    /// bounded queues. Requires a tokio runtime.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds and returns the Scheduler instance.
    ///
    /// Fails with [`LifelineError::NoRuntime`] if the default driver or the
    /// subscriber workers are needed outside a tokio runtime.
    pub fn build(self) -> Result<Arc<Scheduler>, LifelineError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let driver: Arc<dyn TimerDriver> = match self.driver {
            Some(driver) => driver,
            None => Arc::new(TokioDriver::current()?),
        };
        let polls = self
            .polls
            .unwrap_or_else(|| Arc::new(PollRegistry::new(self.cfg.poll_mode, bus.clone())));
        let run_loop = Arc::new(RunLoop::new(driver));

        let scheduler = Arc::new(Scheduler::new_internal(self.cfg, bus.clone(), run_loop, polls));

        if !self.subscribers.is_empty() {
            let rt = Handle::try_current().map_err(|_| LifelineError::NoRuntime)?;
            let subs = SubscriberSet::new(self.subscribers, bus, &rt);
            scheduler.subscriber_listener(subs, &rt);
        }
        Ok(scheduler)
    }
}
