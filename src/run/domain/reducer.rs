//! Per-key merge rules for folding stage updates into the run state.

use super::{RunPhase, RunState, StageUpdate};
use serde::Serialize;

/// How a key's incoming value combines with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The incoming value replaces the stored one.
    Overwrite,
    /// Incoming elements are appended to the stored sequence.
    Append,
}

/// Mutable keys of [`RunState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStateKey {
    /// Coarse progress indicator.
    CurrentPhase,
    /// Sticky stop flag.
    ShouldStop,
    /// Completeness verdict.
    IsComplete,
    /// Completion time.
    CompletedAt,
    /// Running token total.
    TotalTokensUsed,
    /// Fetched ticket.
    TicketContext,
    /// Completeness assessment.
    CompletenessResult,
    /// Repository context.
    RepoContext,
    /// Documentation context.
    DocsContext,
    /// Implementation plan.
    ImplementationPlan,
    /// Code proposal.
    CodeProposal,
    /// Test suggestions.
    TestSuggestions,
    /// Pull request composition.
    PrResult,
    /// Error messages.
    Errors,
    /// Model call identifiers.
    LlmCallIds,
    /// Collaborator call records.
    ToolCalls,
}

impl RunStateKey {
    /// Every key, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::CurrentPhase,
        Self::ShouldStop,
        Self::IsComplete,
        Self::CompletedAt,
        Self::TotalTokensUsed,
        Self::TicketContext,
        Self::CompletenessResult,
        Self::RepoContext,
        Self::DocsContext,
        Self::ImplementationPlan,
        Self::CodeProposal,
        Self::TestSuggestions,
        Self::PrResult,
        Self::Errors,
        Self::LlmCallIds,
        Self::ToolCalls,
    ];

    /// Returns the merge policy for this key.
    #[must_use]
    pub const fn merge_policy(self) -> MergePolicy {
        match self {
            Self::Errors | Self::LlmCallIds | Self::ToolCalls => MergePolicy::Append,
            Self::CurrentPhase
            | Self::ShouldStop
            | Self::IsComplete
            | Self::CompletedAt
            | Self::TotalTokensUsed
            | Self::TicketContext
            | Self::CompletenessResult
            | Self::RepoContext
            | Self::DocsContext
            | Self::ImplementationPlan
            | Self::CodeProposal
            | Self::TestSuggestions
            | Self::PrResult => MergePolicy::Overwrite,
        }
    }

    /// Returns the key name as it appears in serialised state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CurrentPhase => "current_phase",
            Self::ShouldStop => "should_stop",
            Self::IsComplete => "is_complete",
            Self::CompletedAt => "completed_at",
            Self::TotalTokensUsed => "total_tokens_used",
            Self::TicketContext => "ticket_context",
            Self::CompletenessResult => "completeness_result",
            Self::RepoContext => "repo_context",
            Self::DocsContext => "docs_context",
            Self::ImplementationPlan => "implementation_plan",
            Self::CodeProposal => "code_proposal",
            Self::TestSuggestions => "test_suggestions",
            Self::PrResult => "pr_result",
            Self::Errors => "errors",
            Self::LlmCallIds => "llm_call_ids",
            Self::ToolCalls => "tool_calls",
        }
    }
}

/// Folds `update` into `state` and returns the keys that were present.
///
/// Keys absent from the update are untouched. Sequences only grow. The stop
/// flag is only ever raised, so it stays set once any stage sets it. A
/// failed phase is terminal: later phase updates are ignored.
pub(super) fn merge(state: &mut RunState, update: StageUpdate) -> Vec<RunStateKey> {
    let keys = update.present_keys();
    let StageUpdate {
        current_phase,
        should_stop,
        is_complete,
        completed_at,
        total_tokens_used,
        ticket_context,
        completeness_result,
        repo_context,
        docs_context,
        implementation_plan,
        code_proposal,
        test_suggestions,
        pr_result,
        errors,
        llm_call_ids,
        tool_calls,
    } = update;

    let failed = state.current_phase == RunPhase::Failed;
    merge_value(
        RunStateKey::CurrentPhase,
        &mut state.current_phase,
        current_phase.filter(|_| !failed),
    );
    merge_value(RunStateKey::ShouldStop, &mut state.should_stop, should_stop.then_some(true));
    merge_slot(RunStateKey::IsComplete, &mut state.is_complete, is_complete);
    merge_slot(RunStateKey::CompletedAt, &mut state.completed_at, completed_at);
    merge_value(
        RunStateKey::TotalTokensUsed,
        &mut state.total_tokens_used,
        total_tokens_used,
    );
    merge_slot(RunStateKey::TicketContext, &mut state.ticket_context, ticket_context);
    merge_slot(
        RunStateKey::CompletenessResult,
        &mut state.completeness_result,
        completeness_result,
    );
    merge_slot(RunStateKey::RepoContext, &mut state.repo_context, repo_context);
    merge_slot(RunStateKey::DocsContext, &mut state.docs_context, docs_context);
    merge_slot(
        RunStateKey::ImplementationPlan,
        &mut state.implementation_plan,
        implementation_plan,
    );
    merge_slot(RunStateKey::CodeProposal, &mut state.code_proposal, code_proposal);
    merge_slot(
        RunStateKey::TestSuggestions,
        &mut state.test_suggestions,
        test_suggestions,
    );
    merge_slot(RunStateKey::PrResult, &mut state.pr_result, pr_result);
    merge_sequence(RunStateKey::Errors, &mut state.errors, errors);
    merge_sequence(RunStateKey::LlmCallIds, &mut state.llm_call_ids, llm_call_ids);
    merge_sequence(RunStateKey::ToolCalls, &mut state.tool_calls, tool_calls);

    keys
}

fn merge_value<T>(key: RunStateKey, target: &mut T, incoming: Option<T>) {
    debug_assert_eq!(key.merge_policy(), MergePolicy::Overwrite, "{}", key.as_str());
    if let Some(value) = incoming {
        *target = value;
    }
}

fn merge_slot<T>(key: RunStateKey, target: &mut Option<T>, incoming: Option<T>) {
    merge_value(key, target, incoming.map(Some));
}

fn merge_sequence<T>(key: RunStateKey, target: &mut Vec<T>, incoming: Vec<T>) {
    if incoming.is_empty() {
        return;
    }
    match key.merge_policy() {
        MergePolicy::Append => target.extend(incoming),
        MergePolicy::Overwrite => *target = incoming,
    }
}
