//! The contract every pipeline stage implements.

use crate::run::{
    domain::{RunPhase, RunState, StageUpdate},
    ports::CollaboratorError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Identifier of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    /// Loads the ticket.
    FetchTicket,
    /// Scores ticket completeness.
    CompletenessCheck,
    /// Posts a clarification request.
    PostClarification,
    /// Scans the code repository.
    RepoScout,
    /// Retrieves documentation.
    FetchDocs,
    /// Produces the implementation plan.
    Planner,
    /// Drafts code changes.
    CodeProposal,
    /// Drafts tests.
    TestSuggestion,
    /// Opens the pull request.
    PrComposer,
    /// Stamps completion. Always the last stage.
    Finish,
}

impl StageId {
    /// Returns the stage name used in error messages and audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FetchTicket => "fetch_ticket",
            Self::CompletenessCheck => "completeness_check",
            Self::PostClarification => "post_clarification",
            Self::RepoScout => "repo_scout",
            Self::FetchDocs => "fetch_docs",
            Self::Planner => "planner",
            Self::CodeProposal => "code_proposal",
            Self::TestSuggestion => "test_suggestion",
            Self::PrComposer => "pr_composer",
            Self::Finish => "finish",
        }
    }

    /// Returns the phase a successful run of this stage reports.
    #[must_use]
    pub const fn phase(self) -> RunPhase {
        match self {
            Self::FetchTicket => RunPhase::FetchingTicket,
            Self::CompletenessCheck => RunPhase::CheckingCompleteness,
            Self::PostClarification => RunPhase::PostingClarification,
            Self::RepoScout => RunPhase::ScoutingRepo,
            Self::FetchDocs => RunPhase::FetchingDocs,
            Self::Planner => RunPhase::Planning,
            Self::CodeProposal => RunPhase::ProposingCode,
            Self::TestSuggestion => RunPhase::SuggestingTests,
            Self::PrComposer => RunPhase::ComposingPr,
            Self::Finish => RunPhase::Completed,
        }
    }

    /// Returns `true` for stages that only make sense while the run is
    /// healthy.
    ///
    /// The stages up to and including the clarification branch still run
    /// after a stop, so an upstream failure reaches the reporter.
    #[must_use]
    pub const fn requires_healthy_run(self) -> bool {
        matches!(
            self,
            Self::RepoScout
                | Self::FetchDocs
                | Self::Planner
                | Self::CodeProposal
                | Self::TestSuggestion
                | Self::PrComposer
        )
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected failure a stage reports through its update.
///
/// Stages convert these into a failed [`StageUpdate`] with
/// [`StageFailure::into_update`]; they are never raised to the executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageFailure {
    /// An upstream slot the stage needs is empty.
    #[error("{0} is missing")]
    MissingPrecondition(&'static str),

    /// A collaborator call failed.
    #[error(transparent)]
    ExternalCall(#[from] CollaboratorError),

    /// Model output was absent or did not match the expected schema.
    #[error("invalid model output: {0}")]
    OutputValidation(String),
}

impl StageFailure {
    /// Converts the failure into the update that records it.
    pub fn into_update(self, stage: StageId) -> StageUpdate {
        StageUpdate::failed(stage.as_str(), self)
    }
}

/// Unexpected stage failure escaping to the executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageFault {
    /// The stage returned an internal error.
    #[error("unexpected error: {0}")]
    Internal(String),

    /// The stage panicked.
    #[error("stage panicked: {0}")]
    Panicked(String),

    /// No implementation is registered for a stage in the graph.
    #[error("no stage registered for {0}")]
    Unregistered(StageId),
}

impl StageFault {
    /// Wraps any error as an internal fault.
    pub fn internal(err: impl fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked(message)
    }
}

/// A unit of pipeline work.
///
/// A stage reads the current state and returns only the keys it wants to
/// change. Expected failures are reported inside the update; an `Err` is
/// reserved for unexpected faults, which the executor turns into a failed
/// run.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Returns the stage identifier.
    fn id(&self) -> StageId;

    /// Runs the stage against a snapshot of the run state.
    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault>;
}

/// Stage implementations keyed by identifier.
#[derive(Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<StageId, Arc<dyn Stage>>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage under its own identifier, replacing any previous
    /// registration.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.insert(stage.id(), stage);
        self
    }

    /// Returns the stage registered for `id`.
    #[must_use]
    pub fn get(&self, id: StageId) -> Option<&Arc<dyn Stage>> {
        self.stages.get(&id)
    }

    /// Returns `true` when a stage is registered for `id`.
    #[must_use]
    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.stages.keys().collect();
        ids.sort();
        f.debug_struct("StageRegistry").field("stages", &ids).finish()
    }
}
