//! Concrete pipeline stages.
//!
//! Every stage reads what it needs from the run state, calls its
//! collaborators, and returns only the keys it produced. Expected failures
//! (missing upstream output, collaborator errors, unusable model output) are
//! recorded through [`crate::run::pipeline::StageFailure`]; prompt rendering
//! errors are internal faults.

mod clarification;
mod code_proposal;
mod completeness;
mod docs;
mod fetch_ticket;
mod finish;
mod planner;
mod pr_composer;
mod repo_scout;
mod support;
mod test_suggestion;

pub use clarification::{PostClarificationStage, clarification_marker};
pub use code_proposal::CodeProposalStage;
pub use completeness::CompletenessCheckStage;
pub use docs::FetchDocsStage;
pub use fetch_ticket::FetchTicketStage;
pub use finish::FinishStage;
pub use planner::PlannerStage;
pub use pr_composer::{PrComposerStage, branch_name_for};
pub use repo_scout::RepoScoutStage;
pub use test_suggestion::TestSuggestionStage;

use crate::audit::ActivityLogger;
use crate::config::PipelineConfig;
use crate::run::{
    pipeline::StageRegistry,
    ports::{CodeHost, DocumentationSource, LanguageModel, TicketSource},
};
use mockable::Clock;
use std::sync::Arc;

/// Collaborators and settings shared by the stages.
#[derive(Clone)]
pub struct StageDependencies {
    /// Issue tracker.
    pub tickets: Arc<dyn TicketSource>,
    /// Documentation source.
    pub docs: Arc<dyn DocumentationSource>,
    /// Code host.
    pub code_host: Arc<dyn CodeHost>,
    /// Structured-output model.
    pub model: Arc<dyn LanguageModel>,
    /// Pipeline settings.
    pub config: Arc<PipelineConfig>,
    /// Time source.
    pub clock: Arc<dyn Clock + Send + Sync>,
    /// Audit trail.
    pub activity: ActivityLogger,
}

impl std::fmt::Debug for StageDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageDependencies")
            .field("config", &self.config)
            .field("activity", &self.activity)
            .finish_non_exhaustive()
    }
}

/// Builds a registry holding every standard stage.
#[must_use]
pub fn standard_registry(deps: &StageDependencies) -> StageRegistry {
    StageRegistry::new()
        .with_stage(Arc::new(FetchTicketStage::new(deps.clone())))
        .with_stage(Arc::new(CompletenessCheckStage::new(deps.clone())))
        .with_stage(Arc::new(PostClarificationStage::new(deps.clone())))
        .with_stage(Arc::new(RepoScoutStage::new(deps.clone())))
        .with_stage(Arc::new(FetchDocsStage::new(deps.clone())))
        .with_stage(Arc::new(PlannerStage::new(deps.clone())))
        .with_stage(Arc::new(CodeProposalStage::new(deps.clone())))
        .with_stage(Arc::new(TestSuggestionStage::new(deps.clone())))
        .with_stage(Arc::new(PrComposerStage::new(deps.clone())))
        .with_stage(Arc::new(FinishStage::new(Arc::clone(&deps.clock))))
}
