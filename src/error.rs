//! Error types used by the lifeline scheduler.
//!
//! All failures are programmer errors: they are returned synchronously at the
//! call site and are never retried. Cancellation operations never fail.
//!
//! Like the event types, every variant provides helper methods (`as_label`,
//! `as_message`) for logging/metrics.

use std::fmt;

use thiserror::Error;

use crate::core::OwnerId;

/// Why a test-control `advance` was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceRefusal {
    /// No live poll task holds this label.
    NotRegistered,
    /// The poll task exists but has not called `next` since the last tick.
    NotQueued,
}

impl fmt::Display for AdvanceRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvanceRefusal::NotRegistered => f.write_str("no poll task with this label was found"),
            AdvanceRefusal::NotQueued => f.write_str("`next` has not been called"),
        }
    }
}

/// # Errors produced by scheduling operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifelineError {
    /// An operation was invoked on an owner whose destroy hook already ran.
    #[error("called `{op}` on destroyed owner {owner}")]
    Destroyed {
        /// The destroyed owner.
        owner: OwnerId,
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// An argument was rejected (for example an empty debounce name).
    #[error("invalid argument to `{op}`: {reason}")]
    InvalidArgument {
        /// Name of the rejected operation.
        op: &'static str,
        /// What was wrong with the argument.
        reason: &'static str,
    },

    /// A poll label is already held by a live poll task.
    #[error("the label provided to `poll_task` must be unique; `{label}` has already been registered")]
    DuplicateLabel {
        /// The conflicting label.
        label: String,
    },

    /// `advance` was called for a label that cannot be advanced.
    #[error("cannot advance poll task `{label}`: {reason}")]
    UnknownLabel {
        /// The requested label.
        label: String,
        /// Which check failed.
        reason: AdvanceRefusal,
    },

    /// A tokio runtime was required but none is running on this thread.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl LifelineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use lifeline::LifelineError;
    ///
    /// let err = LifelineError::DuplicateLabel { label: "watch".into() };
    /// assert_eq!(err.as_label(), "duplicate_label");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LifelineError::Destroyed { .. } => "owner_destroyed",
            LifelineError::InvalidArgument { .. } => "invalid_argument",
            LifelineError::DuplicateLabel { .. } => "duplicate_label",
            LifelineError::UnknownLabel { .. } => "unknown_label",
            LifelineError::NoRuntime => "no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LifelineError::Destroyed { owner, op } => format!("destroyed: owner={owner} op={op}"),
            LifelineError::InvalidArgument { op, reason } => format!("invalid: op={op} {reason}"),
            LifelineError::DuplicateLabel { label } => format!("duplicate: label={label}"),
            LifelineError::UnknownLabel { label, reason } => {
                format!("unknown: label={label} ({reason})")
            }
            LifelineError::NoRuntime => "no tokio runtime".to_string(),
        }
    }

    /// Indicates whether the error means the owner is gone.
    ///
    /// Useful for callers that race scheduling against teardown and want to
    /// silently drop work for destroyed owners.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, LifelineError::Destroyed { .. })
    }
}
