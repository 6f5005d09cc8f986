//! Scheduler events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by owners, their poll tasks and the poll
//! registry.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Lifeline`, `PollTask` ticks, `PollRegistry`, `SubscriberSet`
//!   workers (overflow/panic).
//! - **Consumers**: the scheduler's subscriber listener (fans out to
//!   `SubscriberSet`), and anyone holding `Bus::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
