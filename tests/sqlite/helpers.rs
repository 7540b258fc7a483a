//! Shared test helpers for `SQLite` integration tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pipewright::run::{
    adapters::sqlite::SqliteRunRepository,
    domain::{
        CompletenessResult, PrComposition, PrCompositionStatus, RunId, RunState, StageUpdate,
        TicketId,
    },
    ports::RunRepository,
};
use rstest::fixture;
use tempfile::TempDir;

/// Repository backed by a database file that lives as long as the guard.
pub struct TestDatabase {
    pub repository: SqliteRunRepository,
    _dir: TempDir,
}

/// Opens a fresh database in a temporary directory.
#[fixture]
pub fn database() -> TestDatabase {
    let dir = tempfile::tempdir().expect("temporary directory");
    let repository =
        SqliteRunRepository::open(&dir.path().join("runs/pipewright.db")).expect("open database");
    TestDatabase {
        repository,
        _dir: dir,
    }
}

/// Parses a ticket key.
pub fn ticket(key: &str) -> TicketId {
    TicketId::new(key).expect("valid ticket id")
}

/// Fixed timestamp `minute` minutes after a reference start.
pub fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::minutes(minute)
}

fn assessment(decision: &str, score: f64) -> CompletenessResult {
    serde_json::from_value(serde_json::json!({
        "decision": decision,
        "completeness_score": score,
    }))
    .expect("valid assessment")
}

/// Final state of a run that judged the ticket and, when `pr_number` is
/// set, opened a pull request.
pub fn verdict_state(
    ticket_id: &TicketId,
    started_at: DateTime<Utc>,
    complete: bool,
    pr_number: Option<u64>,
) -> RunState {
    let mut state = RunState::new(RunId::new(), ticket_id.clone(), started_at);
    let decision = if complete { "complete" } else { "incomplete" };
    let mut update = StageUpdate::new()
        .with_completeness_result(assessment(decision, if complete { 0.9 } else { 0.3 }))
        .with_completeness_verdict(complete)
        .with_llm_call("call-1")
        .with_total_tokens(400)
        .with_completed_at(started_at + Duration::seconds(40));
    if let Some(number) = pr_number {
        update = update.with_pr_result(PrComposition {
            status: PrCompositionStatus::Created,
            pr_url: Some(format!("https://code.example.test/pulls/{number}")),
            pr_number: Some(number),
            branch_name: format!("pipewright/{}", ticket_id.as_str().to_ascii_lowercase()),
            base_branch: "main".to_owned(),
            title: "Proposal".to_owned(),
            body: String::new(),
            draft: true,
            reviewers_requested: Vec::new(),
        });
    }
    state.apply(update);
    state
}

/// Final state of a run that failed in `stage`.
pub fn failed_state(ticket_id: &TicketId, started_at: DateTime<Utc>, stage: &str) -> RunState {
    let mut state = RunState::new(RunId::new(), ticket_id.clone(), started_at);
    state.apply(StageUpdate::failed(stage, "service unavailable"));
    state
}

/// Creates and finalizes a run for `state`.
pub async fn record(repository: &SqliteRunRepository, state: &RunState) {
    repository
        .create_run(state.run_id(), state.ticket_id(), state.started_at())
        .await
        .expect("create run");
    repository
        .finalize_run(
            state.run_id(),
            state,
            state.started_at() + Duration::minutes(1),
        )
        .await
        .expect("finalize run");
}
