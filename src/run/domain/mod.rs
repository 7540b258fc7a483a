//! Domain model for pipeline runs.
//!
//! A run threads one [`RunState`] through the stages of the pipeline. Stages
//! never mutate the state; they return a [`StageUpdate`] that the reducer
//! folds in according to each key's [`MergePolicy`].

mod error;
mod ids;
mod payloads;
mod phase;
mod record;
mod reducer;
mod state;
mod update;

pub use error::{ParseRunValueError, RunDomainError};
pub use ids::{RunId, TicketId};
pub use payloads::{
    ChangeType, CodeProposal, CompletenessDecision, CompletenessResult, DocPage, DocsContext,
    FileAnalysis, FileChange, ImplementationPlan, MissingField, PlanStep, PrComposition,
    PrCompositionStatus, RepoContext, RiskLevel, TestCase, TestKind, TestSuggestions,
    TicketComment, TicketContext, TicketFields,
};
pub use phase::RunPhase;
pub use record::{
    GroundTruthLabel, PrOutcome, ProcessedTicketMarker, RunFinalization, RunRecord, RunStatus,
};
pub use reducer::{MergePolicy, RunStateKey};
pub use state::{RunState, ToolCallRecord};
pub use update::StageUpdate;
