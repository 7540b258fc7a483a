//! The shared run state threaded through every stage.

use super::{
    CodeProposal, CompletenessResult, DocsContext, ImplementationPlan, PrComposition, RepoContext,
    RunId, RunPhase, RunStateKey, StageUpdate, TestSuggestions, TicketContext, TicketId, reducer,
};
use crate::audit::domain::ActivityScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record of a non-model collaborator call made by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Stage that made the call.
    pub stage: String,
    /// Operation name, e.g. `ticket_fetch`.
    pub tool: String,
    /// Free-form call details.
    #[serde(default)]
    pub detail: Value,
}

impl ToolCallRecord {
    /// Creates a record with the given details.
    #[must_use]
    pub fn new(stage: &str, tool: &str, detail: Value) -> Self {
        Self {
            stage: stage.to_owned(),
            tool: tool.to_owned(),
            detail,
        }
    }
}

/// Accumulated state of one run.
///
/// Identity fields are fixed at construction. Everything else changes only
/// through [`RunState::apply`], which enforces the per-key merge policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub(super) run_id: RunId,
    pub(super) ticket_id: TicketId,
    pub(super) started_at: DateTime<Utc>,
    pub(super) current_phase: RunPhase,
    pub(super) should_stop: bool,
    pub(super) is_complete: Option<bool>,
    pub(super) completed_at: Option<DateTime<Utc>>,
    pub(super) total_tokens_used: u64,
    pub(super) ticket_context: Option<TicketContext>,
    pub(super) completeness_result: Option<CompletenessResult>,
    pub(super) repo_context: Option<RepoContext>,
    pub(super) docs_context: Option<DocsContext>,
    pub(super) implementation_plan: Option<ImplementationPlan>,
    pub(super) code_proposal: Option<CodeProposal>,
    pub(super) test_suggestions: Option<TestSuggestions>,
    pub(super) pr_result: Option<PrComposition>,
    pub(super) errors: Vec<String>,
    pub(super) llm_call_ids: Vec<String>,
    pub(super) tool_calls: Vec<ToolCallRecord>,
}

impl RunState {
    /// Creates the initial state for a run.
    #[must_use]
    pub const fn new(run_id: RunId, ticket_id: TicketId, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            ticket_id,
            started_at,
            current_phase: RunPhase::FetchingTicket,
            should_stop: false,
            is_complete: None,
            completed_at: None,
            total_tokens_used: 0,
            ticket_context: None,
            completeness_result: None,
            repo_context: None,
            docs_context: None,
            implementation_plan: None,
            code_proposal: None,
            test_suggestions: None,
            pr_result: None,
            errors: Vec::new(),
            llm_call_ids: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    /// Merges a stage update into this state and returns the keys it touched.
    pub fn apply(&mut self, update: StageUpdate) -> Vec<RunStateKey> {
        reducer::merge(self, update)
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the ticket identifier.
    #[must_use]
    pub const fn ticket_id(&self) -> &TicketId {
        &self.ticket_id
    }

    /// Returns the run start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn current_phase(&self) -> RunPhase {
        self.current_phase
    }

    /// Returns `true` once any stage has requested a stop.
    #[must_use]
    pub const fn should_stop(&self) -> bool {
        self.should_stop
    }

    /// Returns the completeness verdict, if one has been reached.
    #[must_use]
    pub const fn is_complete(&self) -> Option<bool> {
        self.is_complete
    }

    /// Returns the completion time set by the terminal stage.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the running token total.
    #[must_use]
    pub const fn total_tokens_used(&self) -> u64 {
        self.total_tokens_used
    }

    /// Returns the number of model calls made.
    #[must_use]
    pub fn total_llm_calls(&self) -> u64 {
        u64::try_from(self.llm_call_ids.len()).unwrap_or(u64::MAX)
    }

    /// Returns the fetched ticket.
    #[must_use]
    pub const fn ticket_context(&self) -> Option<&TicketContext> {
        self.ticket_context.as_ref()
    }

    /// Returns the completeness assessment.
    #[must_use]
    pub const fn completeness_result(&self) -> Option<&CompletenessResult> {
        self.completeness_result.as_ref()
    }

    /// Returns the repository context.
    #[must_use]
    pub const fn repo_context(&self) -> Option<&RepoContext> {
        self.repo_context.as_ref()
    }

    /// Returns the documentation context.
    #[must_use]
    pub const fn docs_context(&self) -> Option<&DocsContext> {
        self.docs_context.as_ref()
    }

    /// Returns the implementation plan.
    #[must_use]
    pub const fn implementation_plan(&self) -> Option<&ImplementationPlan> {
        self.implementation_plan.as_ref()
    }

    /// Returns the code proposal.
    #[must_use]
    pub const fn code_proposal(&self) -> Option<&CodeProposal> {
        self.code_proposal.as_ref()
    }

    /// Returns the test suggestions.
    #[must_use]
    pub const fn test_suggestions(&self) -> Option<&TestSuggestions> {
        self.test_suggestions.as_ref()
    }

    /// Returns the pull request composition.
    #[must_use]
    pub const fn pr_result(&self) -> Option<&PrComposition> {
        self.pr_result.as_ref()
    }

    /// Returns accumulated error messages, oldest first.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns model call identifiers, oldest first.
    #[must_use]
    pub fn llm_call_ids(&self) -> &[String] {
        &self.llm_call_ids
    }

    /// Returns collaborator call records, oldest first.
    #[must_use]
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    /// Returns the audit scope for events about this run.
    #[must_use]
    pub fn activity_scope(&self) -> ActivityScope {
        ActivityScope::run(self.run_id.to_string(), self.ticket_id.as_str())
    }
}
