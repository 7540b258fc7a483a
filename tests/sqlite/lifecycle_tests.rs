//! Run creation and finalization against `SQLite`.

use crate::sqlite::helpers::{
    TestDatabase, at, database, failed_state, record, ticket, verdict_state,
};
use pipewright::run::{
    domain::{PrOutcome, RunId, RunStatus},
    ports::{RunRepository, RunRepositoryError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_run_starts_running(database: TestDatabase) {
    let repository = &database.repository;
    let run_id = RunId::new();

    repository
        .create_run(run_id, &ticket("OPS-1"), at(0))
        .await
        .expect("create run");

    let stored = repository
        .find_run(run_id)
        .await
        .expect("find run")
        .expect("run stored");
    assert_eq!(stored.status, RunStatus::Running);
    assert_eq!(stored.started_at, at(0));
    assert_eq!(stored.pr_outcome, PrOutcome::NotCreated);
    assert!(stored.completed_at.is_none());
    assert!(stored.state_snapshot.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_run_id_is_rejected(database: TestDatabase) {
    let repository = &database.repository;
    let run_id = RunId::new();
    repository
        .create_run(run_id, &ticket("OPS-1"), at(0))
        .await
        .expect("first create");

    let result = repository.create_run(run_id, &ticket("OPS-1"), at(1)).await;

    assert!(
        matches!(result, Err(RunRepositoryError::DuplicateRun(id)) if id == run_id),
        "expected DuplicateRun, got: {result:?}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn finalization_stores_outcome_and_snapshot(database: TestDatabase) {
    let repository = &database.repository;
    let state = verdict_state(&ticket("OPS-2"), at(0), true, Some(17));

    record(repository, &state).await;

    let stored = repository
        .find_run(state.run_id())
        .await
        .expect("find run")
        .expect("run stored");
    assert_eq!(stored.status, RunStatus::CompletedComplete);
    assert_eq!(stored.duration_seconds, Some(40.0));
    assert_eq!(stored.completeness_score, Some(0.9));
    assert_eq!(stored.ticket_deemed_incomplete, Some(false));
    assert_eq!(stored.pr_number, Some(17));
    assert_eq!(stored.pr_branch.as_deref(), Some("pipewright/ops-2"));
    assert_eq!(stored.pr_outcome, PrOutcome::Pending);
    assert_eq!(stored.llm_call_count, 1);
    assert_eq!(stored.token_count, 400);
    assert!(!stored.error_occurred);
    let snapshot = stored.state_snapshot.expect("snapshot stored");
    assert_eq!(snapshot["ticket_id"], "OPS-2");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_run_keeps_error_origin(database: TestDatabase) {
    let repository = &database.repository;
    let state = failed_state(&ticket("OPS-3"), at(0), "repo_scout");

    record(repository, &state).await;

    let stored = repository
        .find_run(state.run_id())
        .await
        .expect("find run")
        .expect("run stored");
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.error_occurred);
    assert_eq!(stored.error_phase.as_deref(), Some("repo_scout"));
    assert_eq!(
        stored.error_message.as_deref(),
        Some("repo_scout: service unavailable")
    );
    assert_eq!(stored.pr_outcome, PrOutcome::NotCreated);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn finalizing_twice_is_rejected(database: TestDatabase) {
    let repository = &database.repository;
    let state = verdict_state(&ticket("OPS-4"), at(0), false, None);
    record(repository, &state).await;

    let result = repository
        .finalize_run(state.run_id(), &state, at(5))
        .await;

    assert!(
        matches!(result, Err(RunRepositoryError::AlreadyFinalized(id)) if id == state.run_id()),
        "expected AlreadyFinalized, got: {result:?}"
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn finalizing_unknown_run_is_not_found(database: TestDatabase) {
    let state = verdict_state(&ticket("OPS-5"), at(0), true, None);

    let result = database
        .repository
        .finalize_run(state.run_id(), &state, at(1))
        .await;

    assert!(matches!(result, Err(RunRepositoryError::NotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pending_runs_drop_out_once_resolved(database: TestDatabase) {
    let repository = &database.repository;
    let first = verdict_state(&ticket("OPS-6"), at(0), true, Some(1));
    let second = verdict_state(&ticket("OPS-7"), at(10), true, Some(2));
    let without_pr = verdict_state(&ticket("OPS-8"), at(20), true, None);
    for state in [&second, &first, &without_pr] {
        record(repository, state).await;
    }

    let pending: Vec<RunId> = repository
        .pending_pr_runs()
        .await
        .expect("pending runs")
        .into_iter()
        .map(|run| run.run_id)
        .collect();
    assert_eq!(pending, vec![first.run_id(), second.run_id()]);

    repository
        .set_pr_outcome(first.run_id(), PrOutcome::Merged)
        .await
        .expect("outcome stored");
    let remaining = repository.pending_pr_runs().await.expect("pending runs");
    assert_eq!(remaining.len(), 1);

    let missing = repository
        .set_pr_outcome(RunId::new(), PrOutcome::Rejected)
        .await;
    assert!(matches!(missing, Err(RunRepositoryError::NotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runs_for_ticket_are_oldest_first(database: TestDatabase) {
    let repository = &database.repository;
    let key = ticket("OPS-9");
    let later = verdict_state(&key, at(30), true, None);
    let earlier = failed_state(&key, at(5), "planner");
    record(repository, &later).await;
    record(repository, &earlier).await;

    let runs = repository.runs_for_ticket(&key).await.expect("runs");

    let ids: Vec<RunId> = runs.iter().map(|run| run.run_id).collect();
    assert_eq!(ids, vec![earlier.run_id(), later.run_id()]);
}
