//! Append-only activity audit trail for pipeline runs.
//!
//! Every notable step of a run (stage entry and exit, model calls, the final
//! outcome) is captured as an [`domain::ActivityEvent`] and handed to an
//! [`ports::ActivitySink`]. The sink keeps no state beyond a write lock; it
//! only ever appends.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
mod logger;
pub mod ports;

pub use logger::ActivityLogger;
