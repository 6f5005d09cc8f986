//! # Disposable stack.
//!
//! Teardown actions registered by an owner. Handles are process-unique ids, so
//! running one disposable never invalidates the handle of another.
//!
//! ```text
//! push(A) → #1   push(B) → #2   push(C) → #3
//! take(#2)        → B          (A, C remain; #1 and #3 still valid)
//! drain_lifo()    → [C, A]     (reverse registration order)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global disposable id counter.
static DISPOSABLE_SEQ: AtomicU64 = AtomicU64::new(1);

pub(crate) type Disposable = Box<dyn FnOnce() + Send>;

/// Handle returned by [`Lifeline::register_disposable`](crate::Lifeline::register_disposable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisposableId(u64);

impl fmt::Display for DisposableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disposable#{}", self.0)
    }
}

/// Ordered, id-keyed teardown actions.
#[derive(Default)]
pub(crate) struct DisposableStack {
    // ids grow monotonically, so key order is registration order
    entries: BTreeMap<DisposableId, Disposable>,
}

impl DisposableStack {
    pub(crate) fn push(&mut self, disposable: Disposable) -> DisposableId {
        let id = DisposableId(DISPOSABLE_SEQ.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(id, disposable);
        id
    }

    pub(crate) fn take(&mut self, id: DisposableId) -> Option<Disposable> {
        self.entries.remove(&id)
    }

    /// Removes everything, most recently registered first.
    pub(crate) fn drain_lifo(&mut self) -> Vec<Disposable> {
        std::mem::take(&mut self.entries)
            .into_values()
            .rev()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
