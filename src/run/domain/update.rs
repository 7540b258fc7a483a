//! Partial state updates returned by stages.

use super::{
    CodeProposal, CompletenessResult, DocsContext, ImplementationPlan, PrComposition, RepoContext,
    RunPhase, RunStateKey, TestSuggestions, TicketContext, ToolCallRecord,
};
use chrono::{DateTime, Utc};
use std::fmt::Display;

/// Keys a stage wants to change, with their new values.
///
/// Absent keys leave the state untouched. Sequence keys carry only the new
/// elements; the reducer appends them.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct StageUpdate {
    pub(super) current_phase: Option<RunPhase>,
    pub(super) should_stop: bool,
    pub(super) is_complete: Option<bool>,
    pub(super) completed_at: Option<DateTime<Utc>>,
    pub(super) total_tokens_used: Option<u64>,
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

impl StageUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update recording a stage failure.
    ///
    /// Appends `"<stage>: <reason>"`, moves the run to [`RunPhase::Failed`]
    /// and raises the stop flag.
    pub fn failed(stage: &str, reason: impl Display) -> Self {
        Self::new().with_failure(stage, reason)
    }

    /// Adds a stage failure to this update.
    ///
    /// Other keys already carried, such as model call accounting, are kept.
    pub fn with_failure(self, stage: &str, reason: impl Display) -> Self {
        self.with_phase(RunPhase::Failed)
            .stop()
            .with_error(format!("{stage}: {reason}"))
    }

    /// Sets the phase.
    pub const fn with_phase(mut self, phase: RunPhase) -> Self {
        self.current_phase = Some(phase);
        self
    }

    /// Raises the stop flag. The flag cannot be lowered again.
    pub const fn stop(mut self) -> Self {
        self.should_stop = true;
        self
    }

    /// Records the completeness verdict.
    pub const fn with_completeness_verdict(mut self, complete: bool) -> Self {
        self.is_complete = Some(complete);
        self
    }

    /// Sets the completion time.
    pub const fn with_completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = Some(completed_at);
        self
    }

    /// Sets the running token total.
    pub const fn with_total_tokens(mut self, total: u64) -> Self {
        self.total_tokens_used = Some(total);
        self
    }

    /// Fills the ticket slot.
    pub fn with_ticket_context(mut self, value: TicketContext) -> Self {
        self.ticket_context = Some(value);
        self
    }

    /// Fills the completeness slot.
    pub fn with_completeness_result(mut self, value: CompletenessResult) -> Self {
        self.completeness_result = Some(value);
        self
    }

    /// Fills the repository slot.
    pub fn with_repo_context(mut self, value: RepoContext) -> Self {
        self.repo_context = Some(value);
        self
    }

    /// Fills the documentation slot.
    pub fn with_docs_context(mut self, value: DocsContext) -> Self {
        self.docs_context = Some(value);
        self
    }

    /// Fills the plan slot.
    pub fn with_implementation_plan(mut self, value: ImplementationPlan) -> Self {
        self.implementation_plan = Some(value);
        self
    }

    /// Fills the code proposal slot.
    pub fn with_code_proposal(mut self, value: CodeProposal) -> Self {
        self.code_proposal = Some(value);
        self
    }

    /// Fills the test suggestion slot.
    pub fn with_test_suggestions(mut self, value: TestSuggestions) -> Self {
        self.test_suggestions = Some(value);
        self
    }

    /// Fills the pull request slot.
    pub fn with_pr_result(mut self, value: PrComposition) -> Self {
        self.pr_result = Some(value);
        self
    }

    /// Appends an error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    /// Appends a model call identifier.
    pub fn with_llm_call(mut self, call_id: impl Into<String>) -> Self {
        self.llm_call_ids.push(call_id.into());
        self
    }

    /// Appends a collaborator call record.
    pub fn with_tool_call(mut self, record: ToolCallRecord) -> Self {
        self.tool_calls.push(record);
        self
    }

    /// Returns the keys this update carries, in declaration order.
    #[must_use]
    pub fn present_keys(&self) -> Vec<RunStateKey> {
        RunStateKey::ALL
            .into_iter()
            .filter(|key| self.carries(*key))
            .collect()
    }

    /// Returns `true` when the update carries no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.present_keys().is_empty()
    }

    const fn carries(&self, key: RunStateKey) -> bool {
        match key {
            RunStateKey::CurrentPhase => self.current_phase.is_some(),
            RunStateKey::ShouldStop => self.should_stop,
            RunStateKey::IsComplete => self.is_complete.is_some(),
            RunStateKey::CompletedAt => self.completed_at.is_some(),
            RunStateKey::TotalTokensUsed => self.total_tokens_used.is_some(),
            RunStateKey::TicketContext => self.ticket_context.is_some(),
            RunStateKey::CompletenessResult => self.completeness_result.is_some(),
            RunStateKey::RepoContext => self.repo_context.is_some(),
            RunStateKey::DocsContext => self.docs_context.is_some(),
            RunStateKey::ImplementationPlan => self.implementation_plan.is_some(),
            RunStateKey::CodeProposal => self.code_proposal.is_some(),
            RunStateKey::TestSuggestions => self.test_suggestions.is_some(),
            RunStateKey::PrResult => self.pr_result.is_some(),
            RunStateKey::Errors => !self.errors.is_empty(),
            RunStateKey::LlmCallIds => !self.llm_call_ids.is_empty(),
            RunStateKey::ToolCalls => !self.tool_calls.is_empty(),
        }
    }
}
