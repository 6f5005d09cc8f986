//! # Lifeline: the per-owner task registry.
//!
//! A [`Lifeline`] is held by one owner (a component, a session worker, a
//! connection handler). Everything scheduled through it is tied to the owner's
//! lifetime: when [`Lifeline::destroy`] runs, pending work is canceled and
//! teardown actions are drained.
//!
//! ## Per-owner state
//! ```text
//! OwnerState
//! ├─ pending_timers     [(seq, TimerId)]           run_task
//! ├─ pending_debounces  { name → (seq, TimerId) }  debounce_task
//! ├─ poller_labels      [(label, ticket)]          poll_task(Some(label))
//! └─ disposables        DisposableStack            register_disposable
//! ```
//!
//! ## Destroy sequence
//! ```text
//! destroy()
//!   ├─ mark destroyed, take every collection      (under the state lock)
//!   ├─ cancel pending timers                       ─► TaskCanceled
//!   ├─ cancel pending debounces                    ─► DebounceCanceled
//!   ├─ run_loop.release_owner(id)                  (throttle windows)
//!   ├─ clear own poll labels + parked ticks        ─► PollCanceled
//!   ├─ run disposables, newest first               ─► DisposableRun / DisposablePanicked
//!   ├─ publish OwnerDestroyed
//!   └─ isolation off? resume the first disposable panic
//! ```
//!
//! ## Rules
//! - A timer fires only if its entry is still in the pending set; the entry is
//!   removed before the action runs, so canceling a fired handle is a no-op.
//! - Debounce entries carry the sequence number of the call that opened them.
//!   A fire whose sequence is no longer current leaves the entry alone.
//! - The state lock is never held while user code runs or is dropped, so
//!   actions may schedule, cancel or destroy re-entrantly.
//! - After destroy every scheduling operation fails with [`LifelineError::Destroyed`];
//!   cancellation keeps working and does nothing.
//! - Dropping the last handle of a live owner runs the destroy sequence.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::disposables::{Disposable, DisposableId, DisposableStack};
use crate::error::LifelineError;
use crate::events::{Bus, Event, EventKind};
use crate::poll::{Next, PollRegistry, PollTask};
use crate::subscribers::panic_message;
use crate::timer::{RunLoop, TaskKey, TimerId};

/// Global owner id counter.
static OWNER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identity of one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    fn next() -> Self {
        Self(OWNER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value (for logs).
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    seq: u64,
    timer: TimerId,
}

#[derive(Debug, Clone, Copy)]
struct PendingDebounce {
    seq: u64,
    timer: TimerId,
}

#[derive(Default)]
struct OwnerState {
    destroyed: bool,
    seq: u64,
    pending_timers: Vec<PendingTimer>,
    pending_debounces: HashMap<Arc<str>, PendingDebounce>,
    poller_labels: Vec<(Arc<str>, u64)>,
    disposables: DisposableStack,
}

impl OwnerState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Removes the debounce entry for `name` if call `seq` opened it.
    fn take_debounce(&mut self, name: &str, seq: u64) -> bool {
        if self.destroyed || self.pending_debounces.get(name).map(|d| d.seq) != Some(seq) {
            return false;
        }
        self.pending_debounces.remove(name);
        true
    }

    /// Removes the timer entry created under `seq`; `None` if it was canceled.
    fn take_timer(&mut self, seq: u64) -> Option<TimerId> {
        let pos = self.pending_timers.iter().position(|p| p.seq == seq)?;
        Some(self.pending_timers.remove(pos).timer)
    }
}

struct Inner {
    id: OwnerId,
    run_loop: Arc<RunLoop>,
    polls: Arc<PollRegistry>,
    bus: Bus,
    isolate_panics: bool,
    state: Mutex<OwnerState>,
}

impl Inner {
    fn ensure_alive(&self, state: &OwnerState, op: &'static str) -> Result<(), LifelineError> {
        if state.destroyed {
            return Err(LifelineError::Destroyed { owner: self.id, op });
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.state.lock().destroyed
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_owner(self.id)
    }

    fn teardown(&self, isolate_panics: bool) {
        let (timers, debounces, labels, disposables) = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            (
                std::mem::take(&mut state.pending_timers),
                std::mem::take(&mut state.pending_debounces),
                std::mem::take(&mut state.poller_labels),
                state.disposables.drain_lifo(),
            )
        };

        for pending in timers {
            self.run_loop.cancel(pending.timer);
            self.bus.publish(
                self.event(EventKind::TaskCanceled)
                    .with_timer(pending.timer),
            );
        }
        for (name, pending) in debounces {
            self.run_loop.cancel(pending.timer);
            self.bus.publish(
                self.event(EventKind::DebounceCanceled)
                    .with_name(name)
                    .with_timer(pending.timer),
            );
        }
        self.run_loop.release_owner(self.id);
        for (label, ticket) in labels {
            self.polls.cancel_ticket(&label, ticket);
        }
        let mut first_panic = None;
        for disposable in disposables {
            if let Err(payload) = self.dispose(disposable) {
                first_panic.get_or_insert(payload);
            }
        }

        self.bus.publish(self.event(EventKind::OwnerDestroyed));
        if let Some(payload) = first_panic.filter(|_| !isolate_panics) {
            std::panic::resume_unwind(payload);
        }
    }

    fn dispose(&self, disposable: Disposable) -> Result<(), Box<dyn Any + Send>> {
        match std::panic::catch_unwind(AssertUnwindSafe(disposable)) {
            Ok(()) => {
                self.bus.publish(self.event(EventKind::DisposableRun));
                Ok(())
            }
            Err(payload) => {
                self.bus.publish(
                    self.event(EventKind::DisposablePanicked)
                        .with_reason(panic_message(&*payload)),
                );
                Err(payload)
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // a panic escaping drop would abort during unwinding
        self.teardown(true);
    }
}

/// Per-owner task registry.
///
/// Created by [`Scheduler::lifeline`](crate::Scheduler::lifeline). Clones share
/// the same owner; callbacks usually capture a clone to schedule follow-up work.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use lifeline::{Config, ManualDriver, Scheduler};
///
/// let clock = Arc::new(ManualDriver::new());
/// let scheduler = Scheduler::builder(Config::default())
///     .with_driver(clock.clone())
///     .build()?;
///
/// let owner = scheduler.lifeline();
/// owner.run_task(Duration::from_millis(100), || println!("never printed"))?;
///
/// clock.advance(Duration::from_millis(50));
/// owner.destroy();
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(owner.pending_timers(), 0);
/// assert!(owner.run_task(Duration::ZERO, || {}).is_err());
/// # Ok::<(), lifeline::LifelineError>(())
/// ```
#[derive(Clone)]
pub struct Lifeline {
    inner: Arc<Inner>,
}

impl fmt::Debug for Lifeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifeline")
            .field("id", &self.inner.id)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Lifeline {
    pub(crate) fn new(
        run_loop: Arc<RunLoop>,
        polls: Arc<PollRegistry>,
        bus: Bus,
        isolate_panics: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: OwnerId::next(),
                run_loop,
                polls,
                bus,
                isolate_panics,
                state: Mutex::new(OwnerState::default()),
            }),
        }
    }

    /// Identity of this owner.
    pub fn id(&self) -> OwnerId {
        self.inner.id
    }

    /// Whether the destroy sequence has run.
    pub fn is_destroyed(&self) -> bool {
        !self.inner.is_alive()
    }

    fn weak(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    // ---- delayed tasks ----

    /// Runs `task` once after `delay`.
    ///
    /// The returned id can be passed to [`cancel_task`](Self::cancel_task) until
    /// the task fires.
    pub fn run_task<F>(&self, delay: Duration, task: F) -> Result<TimerId, LifelineError>
    where
        F: FnOnce() + Send + 'static,
    {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        inner.ensure_alive(&state, "run_task")?;

        let seq = state.next_seq();
        let owner = self.weak();

        // Holding the state lock here keeps a fast driver from firing before the
        // entry below exists.
        let timer = inner.run_loop.later(
            delay,
            Box::new(move || {
                let Some(inner) = owner.upgrade() else {
                    return;
                };
                let Some(timer) = inner.state.lock().take_timer(seq) else {
                    return;
                };
                inner
                    .bus
                    .publish(inner.event(EventKind::TaskFired).with_timer(timer));
                drop(inner);
                task();
            }),
        );
        state.pending_timers.push(PendingTimer { seq, timer });
        drop(state);

        inner.bus.publish(
            inner
                .event(EventKind::TaskScheduled)
                .with_timer(timer)
                .with_delay(delay),
        );
        Ok(timer)
    }

    /// Cancels a task scheduled with [`run_task`](Self::run_task), or the
    /// debounce window a [`debounce_task`](Self::debounce_task) id belongs to.
    ///
    /// Unknown, fired and already canceled ids are ignored.
    pub fn cancel_task(&self, id: TimerId) {
        let inner = &self.inner;
        let canceled = {
            let mut state = inner.state.lock();
            if let Some(pos) = state.pending_timers.iter().position(|p| p.timer == id) {
                state.pending_timers.remove(pos);
                Some(inner.event(EventKind::TaskCanceled))
            } else {
                let name = state
                    .pending_debounces
                    .iter()
                    .find(|(_, pending)| pending.timer == id)
                    .map(|(name, _)| Arc::clone(name));
                name.map(|name| {
                    state.pending_debounces.remove(&name);
                    inner.event(EventKind::DebounceCanceled).with_name(name)
                })
            }
        };
        if let Some(event) = canceled {
            inner.run_loop.cancel(id);
            inner.bus.publish(event.with_timer(id));
        }
    }

    /// Number of delayed tasks that have neither fired nor been canceled.
    pub fn pending_timers(&self) -> usize {
        self.inner.state.lock().pending_timers.len()
    }

    // ---- debounce / throttle ----

    /// Runs `task` once `wait` has passed without another call for `name`.
    ///
    /// Each call replaces the waiting action with `task` (so the latest
    /// arguments win) and restarts the wait. Every call returns a fresh id for
    /// the restarted window; only the newest one is still cancelable.
    pub fn debounce_task<F>(
        &self,
        name: &str,
        wait: Duration,
        task: F,
    ) -> Result<TimerId, LifelineError>
    where
        F: FnOnce() + Send + 'static,
    {
        check_name("debounce_task", name)?;
        let inner = &self.inner;
        let mut state = inner.state.lock();
        inner.ensure_alive(&state, "debounce_task")?;

        let name: Arc<str> = Arc::from(name);
        let seq = state.next_seq();
        let owner = self.weak();
        let fire_name = Arc::clone(&name);
        // The replaced window still owns the previous task; it is canceled (and
        // the task dropped) only after the state lock is released.
        let (timer, replaced) = inner.run_loop.open_debounce(
            TaskKey::new(inner.id, Arc::clone(&name)),
            wait,
            Box::new(move || {
                let Some(inner) = owner.upgrade() else {
                    return;
                };
                if !inner.state.lock().take_debounce(&fire_name, seq) {
                    return;
                }
                inner
                    .bus
                    .publish(inner.event(EventKind::DebounceFired).with_name(fire_name));
                drop(inner);
                task();
            }),
        );
        state
            .pending_debounces
            .insert(Arc::clone(&name), PendingDebounce { seq, timer });
        drop(state);
        if let Some(replaced) = replaced {
            inner.run_loop.cancel(replaced);
        }

        inner.bus.publish(
            inner
                .event(EventKind::DebounceScheduled)
                .with_name(name)
                .with_timer(timer)
                .with_delay(wait),
        );
        Ok(timer)
    }

    /// Cancels the pending debounce for `name`, if any.
    pub fn cancel_debounce(&self, name: &str) {
        let inner = &self.inner;
        let Some(PendingDebounce { timer, .. }) = inner.state.lock().pending_debounces.remove(name)
        else {
            return;
        };
        inner.run_loop.cancel(timer);
        inner.bus.publish(
            inner
                .event(EventKind::DebounceCanceled)
                .with_name(name)
                .with_timer(timer),
        );
    }

    /// Sorted names of debounces waiting to fire.
    pub fn pending_debounces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .state
            .lock()
            .pending_debounces
            .keys()
            .map(|name| name.to_string())
            .collect();
        names.sort_unstable();
        names
    }

    /// Runs `task` now unless `name` ran within the last `wait`.
    ///
    /// Returns `Ok(true)` if `task` ran and `Ok(false)` if it was suppressed.
    /// Suppressed calls are dropped; nothing runs when the window closes.
    pub fn throttle_task<F>(&self, name: &str, wait: Duration, task: F) -> Result<bool, LifelineError>
    where
        F: FnOnce(),
    {
        check_name("throttle_task", name)?;
        let inner = &self.inner;
        inner.ensure_alive(&inner.state.lock(), "throttle_task")?;

        let key = TaskKey::new(inner.id, name);
        let invoked = inner.run_loop.throttle(key, wait, || {
            inner.bus.publish(
                inner
                    .event(EventKind::ThrottleInvoked)
                    .with_name(name)
                    .with_delay(wait),
            );
            task();
        });
        if !invoked {
            inner
                .bus
                .publish(inner.event(EventKind::ThrottleSuppressed).with_name(name));
        }
        Ok(invoked)
    }

    // ---- polling ----

    /// Starts a poll task.
    ///
    /// `callback` runs once right away and again every time it calls
    /// [`Next::call`] (see [`Next`] for how the poll mode changes that). With a
    /// label the task can be stopped with [`cancel_poll`](Self::cancel_poll) and,
    /// in test-control mode, stepped with
    /// [`PollRegistry::advance`](crate::PollRegistry::advance).
    pub fn poll_task<F>(&self, label: Option<&str>, callback: F) -> Result<(), LifelineError>
    where
        F: Fn(Next) + Send + Sync + 'static,
    {
        if let Some(label) = label {
            check_name("poll_task", label)?;
        }
        let inner = &self.inner;
        let ticket = {
            let mut state = inner.state.lock();
            inner.ensure_alive(&state, "poll_task")?;
            match label {
                Some(label) => {
                    let ticket = inner.polls.register(label)?;
                    state.poller_labels.push((Arc::from(label), ticket));
                    ticket
                }
                None => 0,
            }
        };

        let live = inner.polls.should_poll();
        let owner = self.weak();
        let task = Arc::new(PollTask {
            owner: inner.id,
            label: label.map(Arc::from),
            ticket,
            live,
            callback: Box::new(callback),
            owner_alive: Box::new(move || owner.upgrade().is_some_and(|inner| inner.is_alive())),
            registry: Arc::clone(&inner.polls),
            bus: inner.bus.clone(),
        });

        inner
            .bus
            .publish(inner.event(EventKind::PollRegistered).with_label(label));
        task.tick();
        Ok(())
    }

    /// Stops the poll task registered under `label` and drops its parked tick.
    ///
    /// Unknown labels are ignored.
    pub fn cancel_poll(&self, label: &str) {
        self.inner
            .state
            .lock()
            .poller_labels
            .retain(|(held, _)| &**held != label);
        self.inner.polls.cancel(label);
    }

    /// Labels of the poll tasks this owner started and has not canceled.
    pub fn poll_labels(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .poller_labels
            .iter()
            .map(|(label, _)| label.to_string())
            .collect()
    }

    // ---- disposables ----

    /// Registers a teardown action, run at destroy (newest first) unless it
    /// was already run with [`run_disposable`](Self::run_disposable).
    pub fn register_disposable<F>(&self, disposable: F) -> Result<DisposableId, LifelineError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        self.inner.ensure_alive(&state, "register_disposable")?;
        Ok(state.disposables.push(Box::new(disposable)))
    }

    /// Runs and forgets the disposable `id`. Does nothing if it already ran.
    pub fn run_disposable(&self, id: DisposableId) {
        let disposable = self.inner.state.lock().disposables.take(id);
        if let Some(disposable) = disposable {
            disposable();
            self.inner
                .bus
                .publish(self.inner.event(EventKind::DisposableRun));
        }
    }

    /// Number of registered disposables that have not run yet.
    pub fn disposable_count(&self) -> usize {
        self.inner.state.lock().disposables.len()
    }

    // ---- lifecycle ----

    /// Runs the destroy sequence. Later calls do nothing.
    ///
    /// With `isolate_disposable_panics` disabled, the first disposable panic is
    /// resumed out of this call once every disposable has run and
    /// `OwnerDestroyed` has been published.
    pub fn destroy(&self) {
        self.inner.teardown(self.inner.isolate_panics);
    }

    /// Returns a guard that destroys the owner when dropped.
    pub fn destroy_guard(&self) -> DestroyGuard {
        DestroyGuard {
            lifeline: self.clone(),
        }
    }
}

fn check_name(op: &'static str, name: &str) -> Result<(), LifelineError> {
    if name.is_empty() {
        return Err(LifelineError::InvalidArgument {
            op,
            reason: "name must not be empty",
        });
    }
    Ok(())
}

/// Calls [`Lifeline::destroy`] when dropped.
#[must_use = "the owner is destroyed as soon as the guard is dropped"]
pub struct DestroyGuard {
    lifeline: Lifeline,
}

impl Deref for DestroyGuard {
    type Target = Lifeline;

    fn deref(&self) -> &Lifeline {
        &self.lifeline
    }
}

impl Drop for DestroyGuard {
    fn drop(&mut self) {
        self.lifeline.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdvanceRefusal;
    use crate::poll::PollMode;
    use crate::timer::ManualDriver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Fixture {
        clock: Arc<ManualDriver>,
        run_loop: Arc<RunLoop>,
        polls: Arc<PollRegistry>,
        bus: Bus,
    }

    impl Fixture {
        fn new(mode: PollMode) -> Self {
            let clock = Arc::new(ManualDriver::new());
            let bus = Bus::new(256);
            Self {
                run_loop: Arc::new(RunLoop::new(clock.clone())),
                polls: Arc::new(PollRegistry::new(mode, bus.clone())),
                clock,
                bus,
            }
        }

        fn owner(&self) -> Lifeline {
            Lifeline::new(
                Arc::clone(&self.run_loop),
                Arc::clone(&self.polls),
                self.bus.clone(),
                true,
            )
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, move || -> Box<dyn FnOnce() + Send> {
            let h = h.clone();
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[test]
    fn schedule_then_cancel_never_runs() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();

        let id = owner.run_task(ms(0), bump()).expect("schedule");
        owner.cancel_task(id);
        owner.cancel_task(id);
        fx.clock.advance(ms(10));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(owner.pending_timers(), 0);
    }

    #[test]
    fn fired_task_leaves_pending_set_before_running() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let seen = Arc::new(AtomicUsize::new(usize::MAX));

        let me = owner.clone();
        let s = seen.clone();
        let id = owner
            .run_task(ms(5), move || {
                s.store(me.pending_timers(), Ordering::SeqCst);
            })
            .expect("schedule");
        fx.clock.advance(ms(5));

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        owner.cancel_task(id);
    }

    #[test]
    fn destroy_mid_delay_cancels_task() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();

        owner.run_task(ms(100), bump()).expect("schedule");
        fx.clock.advance(ms(50));
        owner.destroy();
        fx.clock.advance(ms(100));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(fx.clock.pending(), 0);
    }

    #[test]
    fn operations_after_destroy_fail() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        owner.destroy();
        owner.destroy();

        let err = owner.run_task(ms(1), || {}).unwrap_err();
        assert!(err.is_destroyed());
        assert_eq!(
            err,
            LifelineError::Destroyed {
                owner: owner.id(),
                op: "run_task"
            }
        );
        assert!(owner.debounce_task("save", ms(1), || {}).unwrap_err().is_destroyed());
        assert!(owner.throttle_task("scroll", ms(1), || {}).unwrap_err().is_destroyed());
        assert!(owner.poll_task(Some("L"), |_| {}).unwrap_err().is_destroyed());
        assert!(owner.register_disposable(|| {}).unwrap_err().is_destroyed());

        // cancellation stays a no-op
        owner.cancel_debounce("save");
        owner.cancel_poll("L");
        assert!(owner.is_destroyed());
    }

    #[test]
    fn debounce_collapses_to_latest_call() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (at, arg) in [(0, "a"), (100, "b"), (200, "c")] {
            let now = fx.clock.now();
            fx.clock.advance(ms(at) - now);
            let log = log.clone();
            owner
                .debounce_task("save", ms(300), move || log.lock().push(arg))
                .expect("debounce");
        }

        fx.clock.advance(ms(299));
        assert!(log.lock().is_empty());
        assert_eq!(owner.pending_debounces(), vec!["save".to_string()]);

        fx.clock.advance(ms(1));
        assert_eq!(fx.clock.now(), ms(500));
        assert_eq!(*log.lock(), vec!["c"]);
        assert!(owner.pending_debounces().is_empty());
    }

    struct TouchOnDrop {
        owner: Lifeline,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for TouchOnDrop {
        fn drop(&mut self) {
            let _ = self.owner.pending_timers();
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn replaced_debounce_task_is_dropped_outside_the_owner_lock() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let drops = Arc::new(AtomicUsize::new(0));

        let touch = TouchOnDrop {
            owner: owner.clone(),
            drops: drops.clone(),
        };
        owner
            .debounce_task("save", ms(10), move || drop(touch))
            .expect("first");

        let (tx, rx) = std::sync::mpsc::channel();
        let again = owner.clone();
        std::thread::spawn(move || {
            let _ = tx.send(again.debounce_task("save", ms(10), || {}));
        });
        let second = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("second debounce returned");

        assert!(second.is_ok());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(owner.pending_debounces(), vec!["save".to_string()]);
    }

    #[test]
    fn stale_debounce_fire_keeps_newer_entry() {
        let mut state = OwnerState::default();
        let name: Arc<str> = Arc::from("save");
        let old = state.next_seq();
        let newer = state.next_seq();
        let timer = TimerId::next();
        state.pending_debounces.insert(
            Arc::clone(&name),
            PendingDebounce {
                seq: newer,
                timer,
            },
        );

        assert!(!state.take_debounce("save", old));
        assert!(state.pending_debounces.contains_key("save"));
        assert!(state.take_debounce("save", newer));
        assert!(!state.take_debounce("save", newer));

        state.pending_debounces.insert(
            name,
            PendingDebounce {
                seq: newer,
                timer,
            },
        );
        state.destroyed = true;
        assert!(!state.take_debounce("save", newer));
    }

    #[test]
    fn nested_debounce_opens_new_window() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();

        let again = owner.clone();
        let second = bump();
        owner
            .debounce_task("save", ms(10), move || {
                again
                    .debounce_task("save", ms(10), second)
                    .expect("nested debounce");
            })
            .expect("debounce");

        fx.clock.advance(ms(10));
        assert_eq!(owner.pending_debounces(), vec!["save".to_string()]);
        fx.clock.advance(ms(10));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_debounce_and_destroy_stop_debounces() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();

        owner.debounce_task("a", ms(10), bump()).expect("a");
        owner.debounce_task("b", ms(10), bump()).expect("b");
        owner.cancel_debounce("a");
        owner.cancel_debounce("unknown");
        owner.destroy();
        fx.clock.advance(ms(20));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(fx.run_loop.debounce_windows(), 0);
    }

    #[test]
    fn cancel_task_accepts_latest_debounce_handle() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();

        let stale = owner.debounce_task("save", ms(10), bump()).expect("first");
        let latest = owner.debounce_task("save", ms(10), bump()).expect("second");
        owner.cancel_task(stale);
        assert_eq!(owner.pending_debounces(), vec!["save".to_string()]);

        owner.cancel_task(latest);
        assert!(owner.pending_debounces().is_empty());
        fx.clock.advance(ms(20));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_names_are_rejected() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        assert!(matches!(
            owner.debounce_task("", ms(1), || {}),
            Err(LifelineError::InvalidArgument { op: "debounce_task", .. })
        ));
        assert!(matches!(
            owner.throttle_task("", ms(1), || {}),
            Err(LifelineError::InvalidArgument { .. })
        ));
        assert!(matches!(
            owner.poll_task(Some(""), |_| {}),
            Err(LifelineError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn throttle_leading_edge_per_owner() {
        let fx = Fixture::new(PollMode::Live);
        let a = fx.owner();
        let b = fx.owner();
        let (hits, bump) = counter();

        assert!(a.throttle_task("scroll", ms(100), bump()).expect("a1"));
        assert!(!a.throttle_task("scroll", ms(100), bump()).expect("a2"));
        assert!(b.throttle_task("scroll", ms(100), bump()).expect("b1"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        fx.clock.advance(ms(100));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(a.throttle_task("scroll", ms(100), bump()).expect("a3"));
        assert!(b.throttle_task("scroll", ms(100), bump()).expect("b2"));
        assert_eq!(fx.run_loop.throttle_windows(), 2);

        a.destroy();
        assert_eq!(fx.run_loop.throttle_windows(), 1);
    }

    #[test]
    fn disposables_run_in_reverse_order_once() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["closeSocket", "flushBuffer"] {
            let log = log.clone();
            owner
                .register_disposable(move || log.lock().push(tag))
                .expect("register");
        }
        assert_eq!(owner.disposable_count(), 2);

        owner.destroy();
        owner.destroy();
        assert_eq!(*log.lock(), vec!["flushBuffer", "closeSocket"]);
    }

    #[test]
    fn run_disposable_keeps_other_handles_valid() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let log = Arc::new(Mutex::new(Vec::new()));

        let ids: Vec<DisposableId> = ["a", "b", "c"]
            .into_iter()
            .map(|tag| {
                let log = log.clone();
                owner
                    .register_disposable(move || log.lock().push(tag))
                    .expect("register")
            })
            .collect();

        owner.run_disposable(ids[0]);
        owner.run_disposable(ids[0]);
        owner.run_disposable(ids[2]);
        owner.destroy();

        assert_eq!(*log.lock(), vec!["a", "c", "b"]);
    }

    #[test]
    fn panicking_disposable_does_not_stop_the_drain() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();
        let mut rx = fx.bus.subscribe();

        owner.register_disposable(bump()).expect("first");
        owner
            .register_disposable(|| {
                let boom: Option<()> = None;
                boom.expect("disposable failed");
            })
            .expect("second");
        owner.destroy();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let mut panicked = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::DisposablePanicked {
                panicked = true;
                assert_eq!(ev.reason.as_deref(), Some("disposable failed"));
            }
        }
        assert!(panicked);
    }

    #[test]
    fn disposable_panic_resumes_after_full_drain_without_isolation() {
        let fx = Fixture::new(PollMode::Live);
        let owner = Lifeline::new(
            Arc::clone(&fx.run_loop),
            Arc::clone(&fx.polls),
            fx.bus.clone(),
            false,
        );
        let (hits, bump) = counter();
        let mut rx = fx.bus.subscribe();

        owner.register_disposable(bump()).expect("first");
        owner
            .register_disposable(|| {
                let boom: Option<()> = None;
                boom.expect("disposable failed");
            })
            .expect("second");
        owner.register_disposable(bump()).expect("third");

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| owner.destroy()));

        assert!(result.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(owner.is_destroyed());
        assert_eq!(owner.disposable_count(), 0);
        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::DisposablePanicked));
        assert_eq!(kinds.last(), Some(&EventKind::OwnerDestroyed));

        // already destroyed: nothing left to resume
        owner.destroy();
    }

    #[test]
    fn work_registered_during_teardown_is_rejected() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let rejected = Arc::new(AtomicUsize::new(0));

        let inside = owner.clone();
        let r = rejected.clone();
        owner
            .register_disposable(move || {
                if inside.run_task(ms(1), || {}).is_err() {
                    r.fetch_add(1, Ordering::SeqCst);
                }
                inside.destroy();
            })
            .expect("register");
        owner.destroy();

        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        assert_eq!(fx.clock.pending(), 0);
    }

    #[test]
    fn task_can_cancel_sibling_and_destroy_owner() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let (hits, bump) = counter();

        let sibling = owner.run_task(ms(20), bump()).expect("sibling");
        let later = owner.run_task(ms(30), bump()).expect("later");
        let inside = owner.clone();
        owner
            .run_task(ms(10), move || {
                inside.cancel_task(sibling);
                inside.destroy();
                inside.cancel_task(later);
            })
            .expect("canceler");

        fx.clock.advance(ms(50));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(owner.is_destroyed());
    }

    #[test]
    fn dropping_last_handle_destroys_owner() {
        let fx = Fixture::new(PollMode::Live);
        let (hits, bump) = counter();
        let disposed = Arc::new(AtomicUsize::new(0));

        {
            let owner = fx.owner();
            owner.run_task(ms(10), bump()).expect("schedule");
            let d = disposed.clone();
            owner
                .register_disposable(move || {
                    d.fetch_add(1, Ordering::SeqCst);
                })
                .expect("register");
        }
        fx.clock.advance(ms(10));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroy_guard_destroys_on_scope_exit() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        {
            let guard = owner.destroy_guard();
            guard.run_task(ms(10), || {}).expect("schedule");
        }
        assert!(owner.is_destroyed());
        assert_eq!(fx.clock.pending(), 0);
    }

    // ---- polling ----

    #[test]
    fn test_control_poll_is_driven_by_advance() {
        let fx = Fixture::new(PollMode::TestControl);
        let owner = fx.owner();
        let ticks = Arc::new(AtomicUsize::new(0));

        let t = ticks.clone();
        owner
            .poll_task(Some("L"), move |next| {
                t.fetch_add(1, Ordering::SeqCst);
                next.call();
            })
            .expect("poll");
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        fx.polls.advance("L").expect("advance 1");
        fx.polls.advance("L").expect("advance 2");
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(owner.poll_labels(), vec!["L".to_string()]);
    }

    #[test]
    fn advance_without_queued_tick_fails() {
        let fx = Fixture::new(PollMode::TestControl);
        let owner = fx.owner();
        let arm = Arc::new(AtomicUsize::new(0));

        let a = arm.clone();
        owner
            .poll_task(Some("L"), move |next| {
                // only the first tick asks for another
                if a.fetch_add(1, Ordering::SeqCst) == 0 {
                    next.call();
                }
            })
            .expect("poll");

        fx.polls.advance("L").expect("queued by first tick");
        let err = fx.polls.advance("L").unwrap_err();
        assert_eq!(
            err,
            LifelineError::UnknownLabel {
                label: "L".into(),
                reason: AdvanceRefusal::NotQueued
            }
        );
    }

    #[test]
    fn advance_before_first_next_fails() {
        let fx = Fixture::new(PollMode::TestControl);
        let owner = fx.owner();
        owner.poll_task(Some("L"), |_next| {}).expect("poll");
        assert!(matches!(
            fx.polls.advance("L"),
            Err(LifelineError::UnknownLabel {
                reason: AdvanceRefusal::NotQueued,
                ..
            })
        ));
        assert!(matches!(
            fx.polls.advance("nope"),
            Err(LifelineError::UnknownLabel {
                reason: AdvanceRefusal::NotRegistered,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_label_is_rejected_across_owners() {
        let fx = Fixture::new(PollMode::TestControl);
        let a = fx.owner();
        let b = fx.owner();

        a.poll_task(Some("L"), |_| {}).expect("first");
        assert_eq!(
            b.poll_task(Some("L"), |_| {}),
            Err(LifelineError::DuplicateLabel { label: "L".into() })
        );
        assert!(b.poll_labels().is_empty());

        a.cancel_poll("L");
        b.poll_task(Some("L"), |_| {}).expect("free again");
    }

    #[test]
    fn unlabeled_test_control_poll_runs_once() {
        let fx = Fixture::new(PollMode::TestControl);
        let owner = fx.owner();
        let ticks = Arc::new(AtomicUsize::new(0));

        let t = ticks.clone();
        owner
            .poll_task(None, move |next| {
                t.fetch_add(1, Ordering::SeqCst);
                next.call();
            })
            .expect("poll");
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn live_poll_reschedules_through_run_task() {
        let fx = Fixture::new(PollMode::Live);
        let owner = fx.owner();
        let ticks = Arc::new(AtomicUsize::new(0));

        let t = ticks.clone();
        let timers = owner.clone();
        owner
            .poll_task(Some("refresh"), move |next| {
                t.fetch_add(1, Ordering::SeqCst);
                let _ = timers.run_task(ms(100), move || next.call());
            })
            .expect("poll");

        fx.clock.advance(ms(250));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        owner.cancel_poll("refresh");
        fx.clock.advance(ms(500));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn destroy_clears_labels_and_parked_ticks() {
        let fx = Fixture::new(PollMode::TestControl);
        let owner = fx.owner();
        let (hits, bump) = counter();
        let parked = Arc::new(Mutex::new(None));

        let p = parked.clone();
        owner
            .poll_task(Some("L"), move |next| {
                *p.lock() = Some(next.clone());
                next.call();
            })
            .expect("poll");
        assert!(fx.polls.is_queued("L"));

        owner.register_disposable(bump()).expect("register");
        owner.destroy();
        assert!(!fx.polls.is_registered("L"));
        assert!(!fx.polls.is_queued("L"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // a stale continuation from before destroy is inert
        let stale = parked.lock().take();
        if let Some(next) = stale {
            next.call();
        }
        assert!(fx.polls.labels().is_empty());

        let other = fx.owner();
        other.poll_task(Some("L"), |_| {}).expect("label reusable");
    }

    #[test]
    fn should_poll_override_applies_to_new_tasks() {
        let fx = Fixture::new(PollMode::Live);
        fx.polls.set_should_poll(Some(Arc::new(|| false)));
        let owner = fx.owner();
        let ticks = Arc::new(AtomicUsize::new(0));

        let t = ticks.clone();
        owner
            .poll_task(Some("L"), move |next| {
                t.fetch_add(1, Ordering::SeqCst);
                next.call();
            })
            .expect("poll");
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        fx.polls.advance("L").expect("advance");
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
