//! Persisted run history, deduplication markers and ground-truth labels.

use super::{ParseRunValueError, RunDomainError, RunId, RunPhase, RunState, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle status of a persisted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has been created but not finalized.
    Running,
    /// The run finished and the ticket was judged complete.
    CompletedComplete,
    /// The run finished and the ticket was judged incomplete.
    CompletedIncomplete,
    /// The run recorded at least one error.
    Failed,
}

impl RunStatus {
    /// Classifies a final run state.
    ///
    /// Any recorded error means [`RunStatus::Failed`]. Otherwise an explicit
    /// incomplete verdict means [`RunStatus::CompletedIncomplete`], and
    /// everything else [`RunStatus::CompletedComplete`].
    #[must_use]
    pub fn classify(state: &RunState) -> Self {
        if !state.errors().is_empty() {
            Self::Failed
        } else if state.is_complete() == Some(false) {
            Self::CompletedIncomplete
        } else {
            Self::CompletedComplete
        }
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::CompletedComplete => "completed_complete",
            Self::CompletedIncomplete => "completed_incomplete",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for RunStatus {
    type Error = ParseRunValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "running" => Ok(Self::Running),
            "completed_complete" => Ok(Self::CompletedComplete),
            "completed_incomplete" => Ok(Self::CompletedIncomplete),
            "failed" => Ok(Self::Failed),
            other => Err(ParseRunValueError::new("run status", other)),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review outcome of a pull request opened by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrOutcome {
    /// Opened and awaiting review.
    Pending,
    /// Approved by a reviewer.
    Approved,
    /// Closed without merging.
    Rejected,
    /// Merged.
    Merged,
    /// No pull request was opened.
    NotCreated,
}

impl PrOutcome {
    /// Returns `true` for outcomes counted as approvals.
    #[must_use]
    pub const fn is_approval(self) -> bool {
        matches!(self, Self::Approved | Self::Merged)
    }

    /// Returns `true` once a reviewer has acted on the pull request.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Approved | Self::Merged | Self::Rejected)
    }

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Merged => "merged",
            Self::NotCreated => "not_created",
        }
    }
}

impl TryFrom<&str> for PrOutcome {
    type Error = ParseRunValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "merged" => Ok(Self::Merged),
            "not_created" => Ok(Self::NotCreated),
            other => Err(ParseRunValueError::new("pull request outcome", other)),
        }
    }
}

impl fmt::Display for PrOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values written when a run is finalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFinalization {
    /// Final status.
    pub status: RunStatus,
    /// Completion time.
    pub completed_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
    /// Completeness score, when assessed.
    pub completeness_score: Option<f64>,
    /// Negated completeness verdict, when one was reached.
    pub ticket_deemed_incomplete: Option<bool>,
    /// Whether a clarification comment was posted.
    pub clarification_comment_posted: bool,
    /// Whether a plan was produced.
    pub plan_generated: bool,
    /// Whether a code proposal was produced.
    pub code_proposal_generated: bool,
    /// Whether tests were suggested.
    pub tests_suggested: bool,
    /// Pull request URL.
    pub pr_url: Option<String>,
    /// Pull request number.
    pub pr_number: Option<u64>,
    /// Pull request head branch.
    pub pr_branch: Option<String>,
    /// Initial pull request outcome.
    pub pr_outcome: PrOutcome,
    /// Number of model calls.
    pub llm_call_count: u64,
    /// Tokens consumed.
    pub token_count: u64,
    /// Whether any error was recorded.
    pub error_occurred: bool,
    /// Stage or phase where the first error arose.
    pub error_phase: Option<String>,
    /// All error messages joined with `"; "`.
    pub error_message: Option<String>,
    /// Full serialised final state.
    pub state_snapshot: Value,
}

impl RunFinalization {
    /// Derives the finalization values from a final run state.
    ///
    /// `fallback_completed_at` is used when the terminal stage never stamped
    /// a completion time.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] when the state cannot be serialised.
    pub fn from_state(
        state: &RunState,
        fallback_completed_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let completed_at = state.completed_at().unwrap_or(fallback_completed_at);
        let duration_seconds = (completed_at - state.started_at())
            .to_std()
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        let pr = state.pr_result();
        let pr_url = pr.and_then(|result| result.pr_url.clone());
        let pr_outcome = if pr_url.is_some() {
            PrOutcome::Pending
        } else {
            PrOutcome::NotCreated
        };
        let errors = state.errors();

        Ok(Self {
            status: RunStatus::classify(state),
            completed_at,
            duration_seconds,
            completeness_score: state
                .completeness_result()
                .map(|result| result.completeness_score),
            ticket_deemed_incomplete: state.is_complete().map(|complete| !complete),
            clarification_comment_posted: state
                .completeness_result()
                .is_some_and(|result| result.comment_posted),
            plan_generated: state.implementation_plan().is_some(),
            code_proposal_generated: state.code_proposal().is_some(),
            tests_suggested: state.test_suggestions().is_some(),
            pr_url,
            pr_number: pr.and_then(|result| result.pr_number),
            pr_branch: pr
                .filter(|result| result.pr_url.is_some())
                .map(|result| result.branch_name.clone()),
            pr_outcome,
            llm_call_count: state.total_llm_calls(),
            token_count: state.total_tokens_used(),
            error_occurred: !errors.is_empty(),
            error_phase: error_phase(errors, state.current_phase()),
            error_message: (!errors.is_empty()).then(|| errors.join("; ")),
            state_snapshot: serde_json::to_value(state)?,
        })
    }
}

fn error_phase(errors: &[String], phase: RunPhase) -> Option<String> {
    let first = errors.first()?;
    let origin = first
        .split_once(':')
        .map_or_else(|| phase.as_str().to_owned(), |(stage, _)| stage.to_owned());
    Some(origin)
}

/// One persisted run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: RunId,
    /// Ticket processed.
    pub ticket_id: TicketId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds.
    pub duration_seconds: Option<f64>,
    /// Completeness score.
    pub completeness_score: Option<f64>,
    /// Negated completeness verdict.
    pub ticket_deemed_incomplete: Option<bool>,
    /// Whether a clarification comment was posted.
    pub clarification_comment_posted: bool,
    /// Whether a plan was produced.
    pub plan_generated: bool,
    /// Whether a code proposal was produced.
    pub code_proposal_generated: bool,
    /// Whether tests were suggested.
    pub tests_suggested: bool,
    /// Pull request URL.
    pub pr_url: Option<String>,
    /// Pull request number.
    pub pr_number: Option<u64>,
    /// Pull request head branch.
    pub pr_branch: Option<String>,
    /// Pull request outcome.
    pub pr_outcome: PrOutcome,
    /// Number of model calls.
    pub llm_call_count: u64,
    /// Tokens consumed.
    pub token_count: u64,
    /// Whether any error was recorded.
    pub error_occurred: bool,
    /// Stage or phase where the first error arose.
    pub error_phase: Option<String>,
    /// Joined error messages.
    pub error_message: Option<String>,
    /// Serialised final state.
    pub state_snapshot: Option<Value>,
}

impl RunRecord {
    /// Creates a record for a run that has just started.
    #[must_use]
    pub const fn started(run_id: RunId, ticket_id: TicketId, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            ticket_id,
            status: RunStatus::Running,
            started_at,
            completed_at: None,
            duration_seconds: None,
            completeness_score: None,
            ticket_deemed_incomplete: None,
            clarification_comment_posted: false,
            plan_generated: false,
            code_proposal_generated: false,
            tests_suggested: false,
            pr_url: None,
            pr_number: None,
            pr_branch: None,
            pr_outcome: PrOutcome::NotCreated,
            llm_call_count: 0,
            token_count: 0,
            error_occurred: false,
            error_phase: None,
            error_message: None,
            state_snapshot: None,
        }
    }

    /// Applies finalization values.
    ///
    /// # Errors
    ///
    /// Returns [`RunDomainError::AlreadyFinalized`] unless the record is still
    /// running.
    pub fn finalize(&mut self, finalization: RunFinalization) -> Result<(), RunDomainError> {
        if self.status != RunStatus::Running {
            return Err(RunDomainError::AlreadyFinalized(self.run_id));
        }
        self.status = finalization.status;
        self.completed_at = Some(finalization.completed_at);
        self.duration_seconds = Some(finalization.duration_seconds);
        self.completeness_score = finalization.completeness_score;
        self.ticket_deemed_incomplete = finalization.ticket_deemed_incomplete;
        self.clarification_comment_posted = finalization.clarification_comment_posted;
        self.plan_generated = finalization.plan_generated;
        self.code_proposal_generated = finalization.code_proposal_generated;
        self.tests_suggested = finalization.tests_suggested;
        self.pr_url = finalization.pr_url;
        self.pr_number = finalization.pr_number;
        self.pr_branch = finalization.pr_branch;
        self.pr_outcome = finalization.pr_outcome;
        self.llm_call_count = finalization.llm_call_count;
        self.token_count = finalization.token_count;
        self.error_occurred = finalization.error_occurred;
        self.error_phase = finalization.error_phase;
        self.error_message = finalization.error_message;
        self.state_snapshot = Some(finalization.state_snapshot);
        Ok(())
    }

    /// Returns `true` when the run recorded an error or failed outright.
    #[must_use]
    pub fn had_error(&self) -> bool {
        self.error_occurred || self.status == RunStatus::Failed
    }
}

/// Deduplication marker for a ticket that has been queued at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedTicketMarker {
    /// Ticket key.
    pub ticket_id: TicketId,
    /// First time the ticket was queued.
    pub first_seen_at: DateTime<Utc>,
    /// Most recent run for the ticket.
    pub last_run_id: Option<RunId>,
    /// Whether an operator asked for the ticket to be processed again.
    pub reprocess_requested: bool,
}

/// Human judgement of whether a ticket was truly incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthLabel {
    /// Ticket key.
    pub ticket_id: TicketId,
    /// The human verdict.
    pub truly_incomplete: bool,
    /// Who labelled the ticket.
    pub labeled_by: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Labelling time.
    pub labeled_at: DateTime<Utc>,
}

impl GroundTruthLabel {
    /// Creates a label without attribution or notes.
    #[must_use]
    pub const fn new(ticket_id: TicketId, truly_incomplete: bool, labeled_at: DateTime<Utc>) -> Self {
        Self {
            ticket_id,
            truly_incomplete,
            labeled_by: None,
            notes: None,
            labeled_at,
        }
    }

    /// Records who produced the label.
    #[must_use]
    pub fn with_labeler(mut self, labeled_by: impl Into<String>) -> Self {
        self.labeled_by = Some(labeled_by.into());
        self
    }

    /// Attaches notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
