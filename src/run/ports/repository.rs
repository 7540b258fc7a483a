//! Repository port for run history and ticket deduplication.

use crate::run::domain::{
    GroundTruthLabel, PrOutcome, ProcessedTicketMarker, RunDomainError, RunId, RunRecord,
    RunState, TicketId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for run repository operations.
pub type RunRepositoryResult<T> = Result<T, RunRepositoryError>;

/// Run history persistence contract.
///
/// Every operation is atomic with respect to concurrent callers.
#[async_trait]
pub trait RunRepository: Send + Sync {
    /// Inserts a run record in the running state.
    ///
    /// # Errors
    ///
    /// Returns [`RunRepositoryError::DuplicateRun`] when the run identifier
    /// already exists.
    async fn create_run(
        &self,
        run_id: RunId,
        ticket_id: &TicketId,
        started_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()>;

    /// Records that a run for the ticket was queued.
    ///
    /// Inserts the marker on first sight. Otherwise points it at `run_id`
    /// and clears any reprocess request.
    async fn mark_ticket_queued(
        &self,
        ticket_id: &TicketId,
        run_id: RunId,
        queued_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()>;

    /// Returns `true` when the ticket has a marker and no pending reprocess
    /// request.
    async fn is_ticket_processed(&self, ticket_id: &TicketId) -> RunRepositoryResult<bool>;

    /// Asks for the ticket to be processed again. A ticket without a marker
    /// is left alone.
    async fn request_reprocess(&self, ticket_id: &TicketId) -> RunRepositoryResult<()>;

    /// Returns the deduplication marker for a ticket.
    async fn find_marker(
        &self,
        ticket_id: &TicketId,
    ) -> RunRepositoryResult<Option<ProcessedTicketMarker>>;

    /// Writes the outcome of a run in one atomic update.
    ///
    /// The status, counters, pull request fields and state snapshot are
    /// derived from `final_state`. `finalized_at` stands in for the
    /// completion time when the state carries none.
    ///
    /// # Errors
    ///
    /// Returns [`RunRepositoryError::NotFound`] for an unknown run and
    /// [`RunRepositoryError::AlreadyFinalized`] when the run has already left
    /// the running state.
    async fn finalize_run(
        &self,
        run_id: RunId,
        final_state: &RunState,
        finalized_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()>;

    /// Returns a run record.
    async fn find_run(&self, run_id: RunId) -> RunRepositoryResult<Option<RunRecord>>;

    /// Returns every run for a ticket, oldest first.
    async fn runs_for_ticket(&self, ticket_id: &TicketId) -> RunRepositoryResult<Vec<RunRecord>>;

    /// Returns runs whose pull request outcome is still pending.
    async fn pending_pr_runs(&self) -> RunRepositoryResult<Vec<RunRecord>>;

    /// Updates the pull request outcome of a run.
    ///
    /// # Errors
    ///
    /// Returns [`RunRepositoryError::NotFound`] for an unknown run.
    async fn set_pr_outcome(&self, run_id: RunId, outcome: PrOutcome) -> RunRepositoryResult<()>;

    /// Inserts or replaces the ground-truth label for a ticket.
    async fn set_ground_truth(&self, label: &GroundTruthLabel) -> RunRepositoryResult<()>;
}

/// Errors returned by run repository implementations.
#[derive(Debug, Clone, Error)]
pub enum RunRepositoryError {
    /// A run with the same identifier already exists.
    #[error("duplicate run identifier: {0}")]
    DuplicateRun(RunId),

    /// The run was not found.
    #[error("run not found: {0}")]
    NotFound(RunId),

    /// The run has already been finalized.
    #[error("run already finalized: {0}")]
    AlreadyFinalized(RunId),

    /// A stored value could not be mapped back to the domain.
    #[error("invalid stored run data: {0}")]
    InvalidData(String),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl RunRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

impl From<RunDomainError> for RunRepositoryError {
    fn from(err: RunDomainError) -> Self {
        match err {
            RunDomainError::AlreadyFinalized(run_id) => Self::AlreadyFinalized(run_id),
            other => Self::InvalidData(other.to_string()),
        }
    }
}
