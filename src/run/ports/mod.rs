//! Port contracts for run orchestration.
//!
//! Ports define infrastructure-agnostic interfaces used by the pipeline
//! stages and run services.

pub mod collaborators;
pub mod metrics;
pub mod repository;

pub use collaborators::{
    CodeHost, CollaboratorError, CollaboratorResult, CreatedPullRequest, DocumentationSource,
    LanguageModel, LlmCallMetadata, NewPullRequest, PageSummary, PullRequestState,
    PullRequestStatus, ReviewState, StructuredPrompt, StructuredResponse, TicketSource,
    TreeEntry, TreeEntryKind,
};
#[cfg(test)]
pub use collaborators::{MockCodeHost, MockTicketSource};
pub use metrics::{DetectionCounts, PrOutcomeCounts, RunMetricsSource, RunSummaryStats};
pub use repository::{RunRepository, RunRepositoryError, RunRepositoryResult};
