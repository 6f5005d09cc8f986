//! # Event subscribers for the lifeline scheduler.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and
//! the optional [`LogWriter`] for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Lifeline / PollTask / PollRegistry ── publish(Event) ──► Bus ──► listener
//!                                                                    │
//!                                                           SubscriberSet::emit(&Event)
//!                                                                    │
//!                                                   ┌────────────────┼──────────┐
//!                                                   ▼                ▼          ▼
//!                                                LogWriter        Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
