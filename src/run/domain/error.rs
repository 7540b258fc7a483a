//! Error types for run domain validation and parsing.

use super::RunId;
use thiserror::Error;

/// Errors returned while constructing or mutating run domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunDomainError {
    /// The ticket identifier is empty or contains whitespace.
    #[error("invalid ticket identifier '{0}'")]
    InvalidTicketId(String),

    /// The run identifier is not a valid UUID.
    #[error("invalid run identifier '{0}'")]
    InvalidRunId(String),

    /// The run record has already left the running state.
    #[error("run {0} has already been finalized")]
    AlreadyFinalized(RunId),
}

/// Error returned while parsing a stored enumeration value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseRunValueError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// Rejected input.
    pub value: String,
}

impl ParseRunValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
