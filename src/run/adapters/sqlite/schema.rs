//! Diesel schema for run history persistence.

diesel::table! {
    /// One row per pipeline run.
    ticket_runs (id) {
        /// Run identifier (hyphenated UUID).
        id -> Text,
        /// Ticket key.
        ticket_id -> Text,
        /// Lifecycle status.
        status -> Text,
        /// Start time (UTC).
        started_at -> Timestamp,
        /// Completion time (UTC).
        completed_at -> Nullable<Timestamp>,
        /// Wall-clock duration in seconds.
        duration_seconds -> Nullable<Double>,
        /// Completeness score.
        completeness_score -> Nullable<Double>,
        /// Negated completeness verdict.
        ticket_deemed_incomplete -> Nullable<Bool>,
        /// Whether a clarification comment was posted.
        clarification_comment_posted -> Bool,
        /// Whether a plan was produced.
        plan_generated -> Bool,
        /// Whether a code proposal was produced.
        code_proposal_generated -> Bool,
        /// Whether tests were suggested.
        tests_suggested -> Bool,
        /// Pull request URL.
        pr_url -> Nullable<Text>,
        /// Pull request number.
        pr_number -> Nullable<BigInt>,
        /// Pull request head branch.
        pr_branch -> Nullable<Text>,
        /// Pull request outcome.
        pr_outcome -> Text,
        /// Number of model calls.
        llm_call_count -> BigInt,
        /// Tokens consumed.
        token_count -> BigInt,
        /// Whether any error was recorded.
        error_occurred -> Bool,
        /// Stage or phase of the first error.
        error_phase -> Nullable<Text>,
        /// Joined error messages.
        error_message -> Nullable<Text>,
        /// Serialised final state (JSON).
        state_snapshot -> Nullable<Text>,
    }
}

diesel::table! {
    /// Deduplication marker per ticket.
    processed_tickets (ticket_id) {
        /// Ticket key.
        ticket_id -> Text,
        /// First time the ticket was queued.
        first_seen_at -> Timestamp,
        /// Most recent run identifier.
        last_run_id -> Nullable<Text>,
        /// Whether reprocessing was requested.
        reprocess_requested -> Bool,
    }
}

diesel::table! {
    /// Human completeness labels per ticket.
    ticket_ground_truth (ticket_id) {
        /// Ticket key.
        ticket_id -> Text,
        /// Whether the ticket was truly incomplete.
        truly_incomplete -> Bool,
        /// Who labelled the ticket.
        labeled_by -> Nullable<Text>,
        /// Labelling time.
        labeled_at -> Timestamp,
        /// Free-form notes.
        notes -> Nullable<Text>,
    }
}

diesel::joinable!(ticket_runs -> ticket_ground_truth (ticket_id));
diesel::allow_tables_to_appear_in_same_query!(ticket_runs, processed_tickets, ticket_ground_truth);

/// DDL applied when a database is opened.
pub(super) const BOOTSTRAP_SQL: &str = "
CREATE TABLE IF NOT EXISTS ticket_runs (
    id TEXT PRIMARY KEY NOT NULL,
    ticket_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'running',
    started_at TIMESTAMP NOT NULL,
    completed_at TIMESTAMP,
    duration_seconds DOUBLE,
    completeness_score DOUBLE,
    ticket_deemed_incomplete BOOLEAN,
    clarification_comment_posted BOOLEAN NOT NULL DEFAULT 0,
    plan_generated BOOLEAN NOT NULL DEFAULT 0,
    code_proposal_generated BOOLEAN NOT NULL DEFAULT 0,
    tests_suggested BOOLEAN NOT NULL DEFAULT 0,
    pr_url TEXT,
    pr_number BIGINT,
    pr_branch TEXT,
    pr_outcome TEXT NOT NULL DEFAULT 'not_created',
    llm_call_count BIGINT NOT NULL DEFAULT 0,
    token_count BIGINT NOT NULL DEFAULT 0,
    error_occurred BOOLEAN NOT NULL DEFAULT 0,
    error_phase TEXT,
    error_message TEXT,
    state_snapshot TEXT
);
CREATE INDEX IF NOT EXISTS idx_ticket_runs_ticket_id ON ticket_runs (ticket_id);
CREATE INDEX IF NOT EXISTS idx_ticket_runs_started_at ON ticket_runs (started_at);
CREATE INDEX IF NOT EXISTS idx_ticket_runs_pr_outcome ON ticket_runs (pr_outcome);
CREATE TABLE IF NOT EXISTS processed_tickets (
    ticket_id TEXT PRIMARY KEY NOT NULL,
    first_seen_at TIMESTAMP NOT NULL,
    last_run_id TEXT,
    reprocess_requested BOOLEAN NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS ticket_ground_truth (
    ticket_id TEXT PRIMARY KEY NOT NULL,
    truly_incomplete BOOLEAN NOT NULL,
    labeled_by TEXT,
    labeled_at TIMESTAMP NOT NULL,
    notes TEXT
);
";
