//! Tests for the run orchestrator.

use std::sync::Arc;

use super::fixtures::{Harness, model_from, pipeline_responses, scripted_model, ticket_id};
use crate::run::{
    adapters::memory::{InMemoryRunRepository, InMemoryTicketSource},
    domain::{
        GroundTruthLabel, PrOutcome, ProcessedTicketMarker, RunId, RunPhase, RunRecord, RunState,
        RunStatus, TicketId,
    },
    pipeline::block_on,
    ports::{RunRepository, RunRepositoryError, RunRepositoryResult},
    services::RunOrchestrator,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::DefaultClock;
use rstest::rstest;

type Orchestrator<R> = RunOrchestrator<R, DefaultClock>;

fn orchestrator<R: RunRepository>(harness: &Harness, repository: Arc<R>) -> Orchestrator<R> {
    RunOrchestrator::new(
        repository,
        Arc::new(harness.executor()),
        Arc::new(DefaultClock),
        harness.activity(),
    )
}

async fn only_run(repository: &InMemoryRunRepository) -> RunRecord {
    let runs = repository
        .runs_for_ticket(&ticket_id())
        .await
        .expect("runs readable");
    assert_eq!(runs.len(), 1);
    runs.into_iter().next().expect("one run")
}

#[tokio::test(flavor = "multi_thread")]
async fn complete_ticket_runs_to_a_pull_request() {
    let harness = Harness::new(scripted_model("complete", 0.9));
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));

    let state = orchestrator.run_ticket(ticket_id()).await;

    assert_eq!(state.current_phase(), RunPhase::Completed);
    assert!(state.errors().is_empty());
    assert!(state.completed_at().is_some());
    assert_eq!(harness.code_host.opened_pull_requests().len(), 1);

    let record = only_run(&repository).await;
    assert_eq!(record.run_id, state.run_id());
    assert_eq!(record.status, RunStatus::CompletedComplete);
    assert_eq!(record.pr_outcome, PrOutcome::Pending);
    assert_eq!(record.pr_number, Some(1));
    assert!(record.plan_generated);
    assert!(record.code_proposal_generated);
    assert!(record.tests_suggested);
    assert_eq!(record.llm_call_count, 6);
    assert_eq!(record.token_count, 1200);

    let completed = harness.log.events_named("workflow_completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(
        completed.first().and_then(|event| event.field("phase")),
        Some(&serde_json::json!("completed"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn incomplete_ticket_gets_a_clarification() {
    let harness = Harness::new(scripted_model("incomplete", 0.3));
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));

    let state = orchestrator.run_ticket(ticket_id()).await;

    assert_eq!(state.is_complete(), Some(false));
    assert!(state.implementation_plan().is_none());
    assert_eq!(harness.tickets.posted_comments().len(), 1);
    assert!(harness.code_host.opened_pull_requests().is_empty());

    let record = only_run(&repository).await;
    assert_eq!(record.status, RunStatus::CompletedIncomplete);
    assert_eq!(record.ticket_deemed_incomplete, Some(true));
    assert!(record.clarification_comment_posted);
    assert_eq!(record.pr_outcome, PrOutcome::NotCreated);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_ticket_fails_with_one_error() {
    let mut harness = Harness::new(scripted_model("complete", 0.9));
    harness.tickets = InMemoryTicketSource::new().with_unavailable(&ticket_id());
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));

    let state = orchestrator.run_ticket(ticket_id()).await;

    assert_eq!(state.current_phase(), RunPhase::Failed);
    assert_eq!(state.errors().len(), 1);
    assert!(
        state
            .errors()
            .first()
            .is_some_and(|error| error.starts_with("fetch_ticket: "))
    );
    assert!(state.ticket_context().is_none());
    assert!(state.completeness_result().is_none());
    assert!(harness.model.prompts().is_empty());

    let comments = harness.tickets.posted_comments();
    let (_, body) = comments.first().expect("generic clarification posted");
    assert!(body.contains("could not assess"));

    let record = only_run(&repository).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error_phase.as_deref(), Some("fetch_ticket"));
    assert!(record.had_error());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_test_suggestion_stops_before_the_pull_request() {
    let responses = pipeline_responses("complete", 0.9)
        .into_iter()
        .filter(|(template, _)| *template != "test_suggestion")
        .collect();
    let harness = Harness::new(model_from(responses));
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));

    let state = orchestrator.run_ticket(ticket_id()).await;

    assert_eq!(state.current_phase(), RunPhase::Failed);
    assert!(state.should_stop());
    assert_eq!(
        state.errors(),
        ["test_suggestion: invalid model output: no parseable test_suggestions in response"]
    );
    assert!(state.pr_result().is_none());
    assert!(harness.code_host.opened_pull_requests().is_empty());

    let record = only_run(&repository).await;
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error_phase.as_deref(), Some("test_suggestion"));
    assert_eq!(record.pr_outcome, PrOutcome::NotCreated);
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_points_marker_at_latest_run() {
    let harness = Harness::new(scripted_model("complete", 0.9));
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));

    let first = orchestrator.run_ticket(ticket_id()).await;
    let second = orchestrator.run_ticket(ticket_id()).await;

    let marker = repository
        .find_marker(&ticket_id())
        .await
        .expect("marker readable")
        .expect("marker present");
    assert_eq!(marker.last_run_id, Some(second.run_id()));
    assert_ne!(first.run_id(), second.run_id());
    assert!(
        repository
            .is_ticket_processed(&ticket_id())
            .await
            .expect("marker readable")
    );
    assert_eq!(
        repository
            .runs_for_ticket(&ticket_id())
            .await
            .expect("runs readable")
            .len(),
        2
    );
}

#[rstest]
#[case(false, 2)]
#[case(true, 3)]
#[tokio::test(flavor = "multi_thread")]
async fn dispatch_skips_processed_tickets(#[case] reprocess: bool, #[case] expected_runs: usize) {
    let harness = Harness::new(scripted_model("complete", 0.9));
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));
    let fresh = TicketId::new("PROJ-8").expect("valid ticket id");
    orchestrator.run_ticket(ticket_id()).await;
    if reprocess {
        repository
            .request_reprocess(&ticket_id())
            .await
            .expect("reprocess recorded");
    }

    let finished = orchestrator.dispatch([ticket_id(), fresh.clone()]).await;

    assert_eq!(finished.len(), expected_runs - 1);
    assert!(finished.iter().any(|state| state.ticket_id() == &fresh));
    let total = repository
        .runs_for_ticket(&ticket_id())
        .await
        .expect("runs readable")
        .len()
        + repository
            .runs_for_ticket(&fresh)
            .await
            .expect("runs readable")
            .len();
    assert_eq!(total, expected_runs);
}

/// Repository whose every operation fails.
struct UnavailableRepository;

fn unavailable<T>() -> RunRepositoryResult<T> {
    Err(RunRepositoryError::persistence(std::io::Error::other(
        "database is locked",
    )))
}

#[async_trait]
impl RunRepository for UnavailableRepository {
    async fn create_run(&self, _: RunId, _: &TicketId, _: DateTime<Utc>) -> RunRepositoryResult<()> {
        unavailable()
    }

    async fn mark_ticket_queued(
        &self,
        _: &TicketId,
        _: RunId,
        _: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        unavailable()
    }

    async fn is_ticket_processed(&self, _: &TicketId) -> RunRepositoryResult<bool> {
        unavailable()
    }

    async fn request_reprocess(&self, _: &TicketId) -> RunRepositoryResult<()> {
        unavailable()
    }

    async fn find_marker(&self, _: &TicketId) -> RunRepositoryResult<Option<ProcessedTicketMarker>> {
        unavailable()
    }

    async fn finalize_run(&self, _: RunId, _: &RunState, _: DateTime<Utc>) -> RunRepositoryResult<()> {
        unavailable()
    }

    async fn find_run(&self, _: RunId) -> RunRepositoryResult<Option<RunRecord>> {
        unavailable()
    }

    async fn runs_for_ticket(&self, _: &TicketId) -> RunRepositoryResult<Vec<RunRecord>> {
        unavailable()
    }

    async fn pending_pr_runs(&self) -> RunRepositoryResult<Vec<RunRecord>> {
        unavailable()
    }

    async fn set_pr_outcome(&self, _: RunId, _: PrOutcome) -> RunRepositoryResult<()> {
        unavailable()
    }

    async fn set_ground_truth(&self, _: &GroundTruthLabel) -> RunRepositoryResult<()> {
        unavailable()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn bookkeeping_failures_do_not_abort_the_run() {
    let harness = Harness::new(scripted_model("complete", 0.9));
    let orchestrator = orchestrator(&harness, Arc::new(UnavailableRepository));

    let state = orchestrator.run_ticket(ticket_id()).await;

    assert_eq!(state.current_phase(), RunPhase::Completed);
    assert_eq!(harness.log.events_named("workflow_persist_failed").len(), 2);
    assert_eq!(harness.log.events_named("workflow_finalize_failed").len(), 1);
    assert_eq!(harness.log.events_named("workflow_completed").len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatch_skips_tickets_with_unreadable_markers() {
    let harness = Harness::new(scripted_model("complete", 0.9));
    let orchestrator = orchestrator(&harness, Arc::new(UnavailableRepository));

    let finished = orchestrator.dispatch([ticket_id()]).await;

    assert!(finished.is_empty());
    assert!(harness.model.prompts().is_empty());
}

#[test]
fn blocking_entry_point_runs_without_a_runtime() {
    let harness = Harness::new(scripted_model("complete", 0.9));
    let repository = Arc::new(InMemoryRunRepository::new());
    let orchestrator = orchestrator(&harness, Arc::clone(&repository));

    let state = orchestrator
        .run_ticket_blocking(ticket_id())
        .expect("bridge available");

    assert_eq!(state.current_phase(), RunPhase::Completed);
    let stored = block_on(repository.find_run(state.run_id()))
        .expect("bridge available")
        .expect("run readable")
        .expect("run stored");
    assert_eq!(stored.status, RunStatus::CompletedComplete);
}
