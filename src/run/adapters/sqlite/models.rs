//! Diesel row models for run history persistence.

use super::schema::{processed_tickets, ticket_ground_truth, ticket_runs};
use chrono::NaiveDateTime;
use diesel::prelude::*;

/// Query result row for run records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ticket_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RunRow {
    /// Run identifier.
    pub id: String,
    /// Ticket key.
    pub ticket_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Start time.
    pub started_at: NaiveDateTime,
    /// Completion time.
    pub completed_at: Option<NaiveDateTime>,
    /// Duration in seconds.
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
    pub pr_number: Option<i64>,
    /// Pull request head branch.
    pub pr_branch: Option<String>,
    /// Pull request outcome.
    pub pr_outcome: String,
    /// Number of model calls.
    pub llm_call_count: i64,
    /// Tokens consumed.
    pub token_count: i64,
    /// Whether any error was recorded.
    pub error_occurred: bool,
    /// Stage or phase of the first error.
    pub error_phase: Option<String>,
    /// Joined error messages.
    pub error_message: Option<String>,
    /// Serialised final state.
    pub state_snapshot: Option<String>,
}

/// Insert model for a newly started run.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_runs)]
pub struct NewRunRow {
    /// Run identifier.
    pub id: String,
    /// Ticket key.
    pub ticket_id: String,
    /// Lifecycle status.
    pub status: String,
    /// Start time.
    pub started_at: NaiveDateTime,
    /// Pull request outcome.
    pub pr_outcome: String,
}

/// Update model applied when a run is finalized.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = ticket_runs)]
#[diesel(treat_none_as_null = true)]
pub struct RunFinalizationChangeset {
    /// Final status.
    pub status: String,
    /// Completion time.
    pub completed_at: Option<NaiveDateTime>,
    /// Duration in seconds.
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
    pub pr_number: Option<i64>,
    /// Pull request head branch.
    pub pr_branch: Option<String>,
    /// Pull request outcome.
    pub pr_outcome: String,
    /// Number of model calls.
    pub llm_call_count: i64,
    /// Tokens consumed.
    pub token_count: i64,
    /// Whether any error was recorded.
    pub error_occurred: bool,
    /// Stage or phase of the first error.
    pub error_phase: Option<String>,
    /// Joined error messages.
    pub error_message: Option<String>,
    /// Serialised final state.
    pub state_snapshot: Option<String>,
}

/// Query and insert model for deduplication markers.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = processed_tickets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarkerRow {
    /// Ticket key.
    pub ticket_id: String,
    /// First time the ticket was queued.
    pub first_seen_at: NaiveDateTime,
    /// Most recent run identifier.
    pub last_run_id: Option<String>,
    /// Whether reprocessing was requested.
    pub reprocess_requested: bool,
}

/// Insert model for ground-truth labels.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ticket_ground_truth)]
pub struct GroundTruthRow {
    /// Ticket key.
    pub ticket_id: String,
    /// Whether the ticket was truly incomplete.
    pub truly_incomplete: bool,
    /// Who labelled the ticket.
    pub labeled_by: Option<String>,
    /// Labelling time.
    pub labeled_at: NaiveDateTime,
    /// Free-form notes.
    pub notes: Option<String>,
}
