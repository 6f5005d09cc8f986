//! # Tokio-backed timer driver.
//!
//! Every scheduled callback is a spawned task racing `tokio::time::sleep`
//! against its own [`CancellationToken`]:
//!
//! ```text
//! schedule(delay, cb) ──► armed.insert(id, token) ──► spawn {
//!                                                       select! {
//!                                                         token.cancelled() → exit
//!                                                         sleep(delay)      → armed.remove(id)? → cb()
//!                                                       }
//!                                                     }
//! cancel(id) ──► armed.remove(id)? → token.cancel()
//! ```
//!
//! ## Rules
//! - Removal from `armed` is the single point that decides fire vs. cancel, so a
//!   callback whose cancel returned `true` can never run, even if its sleep
//!   already elapsed on another worker thread.
//! - Callbacks run on the runtime's worker threads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::{Callback, TimerDriver, TimerId};
use crate::error::LifelineError;

/// Timer driver that spawns one tokio task per pending callback.
#[derive(Clone)]
pub struct TokioDriver {
    rt: Handle,
    armed: Arc<Mutex<HashMap<TimerId, CancellationToken>>>,
}

impl TokioDriver {
    /// Creates a driver that spawns timers on the given runtime.
    pub fn new(rt: Handle) -> Self {
        Self {
            rt,
            armed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Creates a driver bound to the runtime of the calling context.
    ///
    /// Fails with [`LifelineError::NoRuntime`] outside a tokio runtime.
    pub fn current() -> Result<Self, LifelineError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| LifelineError::NoRuntime)
    }

    /// Number of callbacks still waiting to fire.
    pub fn armed(&self) -> usize {
        self.armed.lock().len()
    }
}

impl TimerDriver for TokioDriver {
    fn schedule(&self, delay: Duration, callback: Callback) -> TimerId {
        let id = TimerId::next();
        let token = CancellationToken::new();
        self.armed.lock().insert(id, token.clone());

        let armed = Arc::clone(&self.armed);
        self.rt.spawn(async move {
            let elapsed = tokio::select! {
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if !elapsed {
                return;
            }
            let still_armed = armed.lock().remove(&id).is_some();
            if still_armed {
                callback();
            }
        });
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        let token = self.armed.lock().remove(&id);
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let make = move || -> Callback {
            let h = h.clone();
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
        };
        (hits, make)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let driver = TokioDriver::current().expect("runtime");
        let (hits, make) = counter();

        driver.schedule(Duration::from_millis(100), make());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(driver.armed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire_and_is_idempotent() {
        let driver = TokioDriver::current().expect("runtime");
        let (hits, make) = counter();

        let id = driver.schedule(Duration::from_millis(100), make());
        assert!(driver.cancel(id));
        assert!(!driver.cancel(id));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_is_noop() {
        let driver = TokioDriver::current().expect("runtime");
        let (hits, make) = counter();

        let id = driver.schedule(Duration::ZERO, make());
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!driver.cancel(id));
    }

    #[test]
    fn current_outside_runtime_fails() {
        assert_eq!(TokioDriver::current().err(), Some(LifelineError::NoRuntime));
    }
}
