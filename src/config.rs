//! # Global scheduler configuration.
//!
//! Provides [`Config`], the centralized settings for a [`Scheduler`](crate::Scheduler).
//!
//! Config is consumed once by `Scheduler::builder(config)`. Everything else
//! (delays, debounce waits, throttle windows) is passed per call.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`Config::bus_capacity_clamped`]

use crate::poll::PollMode;

/// Global configuration for the scheduler.
///
/// ## Field semantics
/// - `poll_mode`: whether poll tasks re-run themselves (`Live`) or wait for `advance` (`TestControl`)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `isolate_disposable_panics`: swallow disposable panics instead of resuming them after the drain
///
/// ## Notes
/// All fields are public for flexibility. The poll mode can be overridden at any
/// time through [`PollRegistry::set_should_poll`](crate::PollRegistry::set_should_poll).
#[derive(Clone, Debug)]
pub struct Config {
    /// Initial poll mode of the scheduler's [`PollRegistry`](crate::PollRegistry).
    ///
    /// Ignored when an explicit registry is injected with
    /// `SchedulerBuilder::with_poll_registry`.
    pub poll_mode: PollMode,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Catch panics raised by disposables during the destroy sequence.
    ///
    /// - `true`: the panic is reported as `DisposablePanicked` and the
    ///   remaining disposables still run
    /// - `false`: every disposable still runs and `OwnerDestroyed` is published,
    ///   then the first panic resumes out of `destroy()`
    pub isolate_disposable_panics: bool,
}

impl Config {
    /// Configuration for deterministic tests: poll tasks are driven by `advance`.
    pub fn test_control() -> Self {
        Self {
            poll_mode: PollMode::TestControl,
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `poll_mode = PollMode::Live`
    /// - `bus_capacity = 1024`
    /// - `isolate_disposable_panics = true`
    fn default() -> Self {
        Self {
            poll_mode: PollMode::Live,
            bus_capacity: 1024,
            isolate_disposable_panics: true,
        }
    }
}
