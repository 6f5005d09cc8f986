//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the extension point for observing scheduler events
//! (logging, metrics, test recorders).
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SubscriberPanicked`)
//!
//! ## Rules
//! - A slow subscriber only affects its own queue; it never delays a timer callback.
//! - Queue overflow drops the event **for this subscriber only** and publishes
//!   `EventKind::SubscriberOverflow`.
//! - Events are processed sequentially (FIFO) per subscriber.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use lifeline::{Event, EventKind, Subscribe};
//!
//! struct LeakProbe;
//!
//! #[async_trait]
//! impl Subscribe for LeakProbe {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::DisposablePanicked) {
//!             // alert, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "leak-check" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are **dropped**.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
