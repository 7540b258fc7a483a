//! Port contract for activity sinks.

use super::domain::ActivityEvent;
use thiserror::Error;

/// Append-only destination for activity events.
///
/// Implementations must serialise concurrent writers so that events from
/// parallel runs never interleave within a record.
pub trait ActivitySink: Send + Sync {
    /// Appends one event.
    ///
    /// # Errors
    ///
    /// Returns [`ActivitySinkError`] when the event cannot be encoded or
    /// written.
    fn record(&self, event: &ActivityEvent) -> Result<(), ActivitySinkError>;
}

/// Errors returned by activity sinks.
#[derive(Debug, Error)]
pub enum ActivitySinkError {
    /// The underlying writer failed.
    #[error("failed to write activity log: {0}")]
    Io(#[from] std::io::Error),

    /// The event could not be encoded.
    #[error("failed to encode activity event: {0}")]
    Encode(#[from] serde_json::Error),

    /// A previous writer panicked while holding the write lock.
    #[error("activity log lock poisoned")]
    Poisoned,
}
