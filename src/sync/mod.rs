//! Thread hand-off primitives

mod queue;

pub use queue::BoundedQueue;

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// Errors reported by [`BoundedQueue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was switched off with `enable(false)`.
    #[error("queue is disabled")]
    Disabled,

    /// No room or no item before the deadline.
    #[error("timed out")]
    Timeout,

    /// `try_put` on a full queue.
    #[error("queue is full")]
    Full,

    /// `try_get` on an empty queue.
    #[error("queue is empty")]
    Empty,

    /// Invalid construction parameters.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// The ring buffer could not be allocated.
    #[error("allocation failed: {0}")]
    Allocation(#[source] TryReserveError),
}

impl QueueError {
    pub(crate) fn bad_parameters(message: &str) -> Self {
        tracing::error!(message, "invalid queue parameters");
        QueueError::BadParameters(message.to_string())
    }

    pub(crate) fn allocation(source: TryReserveError) -> Self {
        tracing::error!(error = %source, "queue allocation failure");
        QueueError::Allocation(source)
    }
}

/// A `put` that did not go through, carrying the item back to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Rejected<T> {
    /// The item that was not queued
    pub item: T,

    /// Why it was not queued
    pub reason: QueueError,
}

impl<T> Rejected<T> {
    pub(crate) fn new(item: T, reason: QueueError) -> Self {
        Self { item, reason }
    }

    /// Recover the item.
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item rejected: {}", self.reason)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}
