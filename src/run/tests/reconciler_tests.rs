//! Pull request outcome reconciliation tests.

use std::sync::Arc;

use super::fixtures::{Harness, at, scripted_model, state_with_pr};
use crate::run::{
    adapters::memory::InMemoryRunRepository,
    domain::{PrOutcome, RunState},
    ports::{
        CollaboratorError, MockCodeHost, PullRequestState, PullRequestStatus, ReviewState,
        RunRepository,
    },
    services::{PrReconciler, ReconcileSummary, outcome_from_status},
};
use mockall::predicate::eq;
use rstest::rstest;

fn status(state: PullRequestState, merged: bool, reviews: Vec<ReviewState>) -> PullRequestStatus {
    PullRequestStatus {
        state,
        merged,
        reviews,
    }
}

#[rstest]
#[case(status(PullRequestState::Closed, true, vec![]), PrOutcome::Merged)]
#[case(status(PullRequestState::Closed, false, vec![ReviewState::Approved]), PrOutcome::Rejected)]
#[case(status(PullRequestState::Open, false, vec![ReviewState::ChangesRequested, ReviewState::Approved]), PrOutcome::Approved)]
#[case(status(PullRequestState::Open, false, vec![ReviewState::Commented]), PrOutcome::Pending)]
#[case(status(PullRequestState::Open, false, vec![]), PrOutcome::Pending)]
fn outcome_mapping(#[case] pr: PullRequestStatus, #[case] expected: PrOutcome) {
    assert_eq!(outcome_from_status(&pr), expected);
}

async fn recorded(repository: &InMemoryRunRepository, state: &RunState) {
    repository
        .create_run(state.run_id(), state.ticket_id(), state.started_at())
        .await
        .expect("run created");
    repository
        .finalize_run(state.run_id(), state, state.started_at())
        .await
        .expect("run finalized");
}

async fn outcome_of(repository: &InMemoryRunRepository, state: &RunState) -> PrOutcome {
    repository
        .find_run(state.run_id())
        .await
        .expect("lookup succeeds")
        .expect("run exists")
        .pr_outcome
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_updates_resolved_pull_requests_only() {
    let repository = Arc::new(InMemoryRunRepository::new());
    let merged = state_with_pr(at(0), 11);
    let open = state_with_pr(at(1), 12);
    let unreachable = state_with_pr(at(2), 13);
    for state in [&merged, &open, &unreachable] {
        recorded(&repository, state).await;
    }
    let mut code_host = MockCodeHost::new();
    code_host
        .expect_pull_request_status()
        .with(eq(11))
        .times(1)
        .returning(|_| Ok(status(PullRequestState::Closed, true, vec![])));
    code_host
        .expect_pull_request_status()
        .with(eq(12))
        .times(1)
        .returning(|_| Ok(status(PullRequestState::Open, false, vec![ReviewState::Commented])));
    code_host
        .expect_pull_request_status()
        .with(eq(13))
        .times(1)
        .returning(|_| Err(CollaboratorError::request("code host", "rate limited")));
    let harness = Harness::new(scripted_model("complete", 0.9));
    let reconciler = PrReconciler::new(
        Arc::clone(&repository),
        Arc::new(code_host),
        harness.activity(),
    );

    let summary = reconciler.reconcile().await.expect("reconcile succeeds");

    assert_eq!(
        summary,
        ReconcileSummary {
            checked: 3,
            updated: 1,
            failed: 1,
        }
    );
    assert_eq!(outcome_of(&repository, &merged).await, PrOutcome::Merged);
    assert_eq!(outcome_of(&repository, &open).await, PrOutcome::Pending);
    assert_eq!(outcome_of(&repository, &unreachable).await, PrOutcome::Pending);
    let events = harness.log.events_named("pr_outcome_updated");
    assert_eq!(events.len(), 1);
    assert_eq!(
        events.first().and_then(|event| event.field("outcome")),
        Some(&serde_json::json!("merged"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn resolved_runs_are_not_checked_again() {
    let repository = Arc::new(InMemoryRunRepository::new());
    let state = state_with_pr(at(0), 21);
    recorded(&repository, &state).await;
    let mut code_host = MockCodeHost::new();
    code_host
        .expect_pull_request_status()
        .times(1)
        .returning(|_| Ok(status(PullRequestState::Open, false, vec![ReviewState::Approved])));
    let harness = Harness::new(scripted_model("complete", 0.9));
    let reconciler = PrReconciler::new(repository, Arc::new(code_host), harness.activity());

    let first = reconciler.reconcile().await.expect("first pass");
    let second = reconciler.reconcile().await.expect("second pass");

    assert_eq!(first.updated, 1);
    assert_eq!(second, ReconcileSummary::default());
}
