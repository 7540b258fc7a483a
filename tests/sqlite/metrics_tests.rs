//! Aggregate KPI queries against `SQLite`.

use std::sync::Arc;

use crate::sqlite::helpers::{
    TestDatabase, at, database, failed_state, record, ticket, verdict_state,
};
use pipewright::run::{
    domain::{GroundTruthLabel, PrOutcome, RunId, RunState, StageUpdate},
    ports::{RunMetricsSource, RunRepository},
    services::MetricsCollector,
};
use mockable::DefaultClock;
use rstest::rstest;
use uuid::Uuid;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_history_has_zero_counts(database: TestDatabase) {
    let repository = &database.repository;

    let outcomes = repository.pr_outcome_counts().await.expect("pr counts");
    let detection = repository.detection_counts().await.expect("detection");
    let summary = repository.run_summary().await.expect("summary");

    assert_eq!(outcomes.created, 0);
    assert_eq!(detection.tickets_processed, 0);
    assert!(summary.average_duration_seconds.is_none());
    assert!(summary.average_tokens_per_run.is_none());
    assert!(
        repository
            .error_flags_by_start()
            .await
            .expect("flags")
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pull_request_outcomes_are_tallied(database: TestDatabase) {
    let repository = &database.repository;
    let outcomes = [
        (1, PrOutcome::Approved),
        (2, PrOutcome::Merged),
        (3, PrOutcome::Rejected),
        (4, PrOutcome::Pending),
    ];
    for (minute, outcome) in outcomes {
        let number = u64::try_from(minute).expect("positive minute");
        let key = ticket(&format!("OPS-{number}"));
        let state = verdict_state(&key, at(minute), true, Some(number));
        record(repository, &state).await;
        if outcome != PrOutcome::Pending {
            repository
                .set_pr_outcome(state.run_id(), outcome)
                .await
                .expect("outcome stored");
        }
    }
    record(repository, &verdict_state(&ticket("OPS-9"), at(9), true, None)).await;

    let counts = repository.pr_outcome_counts().await.expect("pr counts");

    assert_eq!(counts.created, 4);
    assert_eq!(counts.approved, 2);
    assert_eq!(counts.resolved, 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn detection_counts_match_ground_truth_per_ticket(database: TestDatabase) {
    let repository = &database.repository;
    let flagged = ticket("OPS-1");
    let missed = ticket("OPS-2");
    let clean = ticket("OPS-3");
    record(repository, &verdict_state(&flagged, at(0), false, None)).await;
    record(repository, &verdict_state(&flagged, at(5), false, None)).await;
    record(repository, &verdict_state(&missed, at(10), true, Some(1))).await;
    record(repository, &verdict_state(&clean, at(15), true, Some(2))).await;
    for (key, incomplete) in [(&flagged, true), (&missed, true), (&clean, false)] {
        repository
            .set_ground_truth(&GroundTruthLabel::new(key.clone(), incomplete, at(60)))
            .await
            .expect("label stored");
    }

    let counts = repository.detection_counts().await.expect("detection");

    assert_eq!(counts.tickets_processed, 3);
    assert_eq!(counts.flagged_incomplete, 2);
    assert_eq!(counts.labelled_incomplete, 2);
    assert_eq!(counts.true_positives, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn relabelling_replaces_the_earlier_verdict(database: TestDatabase) {
    let repository = &database.repository;
    let key = ticket("OPS-10");

    repository
        .set_ground_truth(&GroundTruthLabel::new(key.clone(), true, at(0)).with_labeler("qa"))
        .await
        .expect("first label");
    repository
        .set_ground_truth(
            &GroundTruthLabel::new(key, false, at(5)).with_notes("scope was clear after all"),
        )
        .await
        .expect("replacement label");

    let counts = repository.detection_counts().await.expect("detection");
    assert_eq!(counts.labelled_incomplete, 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn error_flags_follow_start_order(database: TestDatabase) {
    let repository = &database.repository;
    record(repository, &verdict_state(&ticket("OPS-1"), at(20), true, None)).await;
    record(repository, &failed_state(&ticket("OPS-2"), at(10), "planner")).await;
    record(repository, &verdict_state(&ticket("OPS-3"), at(0), true, None)).await;
    repository
        .create_run(RunId::new(), &ticket("OPS-4"), at(30))
        .await
        .expect("running run");

    let flags = repository.error_flags_by_start().await.expect("flags");

    assert_eq!(flags, vec![false, true, false, false]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_starts_are_ordered_by_run_id(database: TestDatabase) {
    let repository = &database.repository;
    let run_with_id = |id: u128, key: &str| {
        RunState::new(RunId::from_uuid(Uuid::from_u128(id)), ticket(key), at(5))
    };
    let mut succeeded = run_with_id(2, "OPS-1");
    succeeded.apply(StageUpdate::new().with_completeness_verdict(true));
    let mut failed = run_with_id(1, "OPS-2");
    failed.apply(StageUpdate::failed("planner", "service unavailable"));
    record(repository, &succeeded).await;
    record(repository, &failed).await;

    let flags = repository.error_flags_by_start().await.expect("flags");

    assert_eq!(flags, vec![true, false]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn summary_averages_finished_runs(database: TestDatabase) {
    let repository = &database.repository;
    record(repository, &verdict_state(&ticket("OPS-1"), at(0), true, None)).await;
    record(repository, &verdict_state(&ticket("OPS-2"), at(5), false, None)).await;
    record(repository, &failed_state(&ticket("OPS-3"), at(10), "fetch_ticket")).await;

    let summary = repository.run_summary().await.expect("summary");

    assert_eq!(summary.complete_runs, 1);
    assert_eq!(summary.incomplete_runs, 1);
    assert_eq!(summary.average_tokens_per_run, Some(400.0));
    assert!(summary.average_duration_seconds.is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn collector_reads_kpis_from_sqlite(database: TestDatabase) {
    let repository = Arc::new(database.repository.clone());
    let approved = verdict_state(&ticket("OPS-1"), at(0), true, Some(1));
    record(&repository, &approved).await;
    repository
        .set_pr_outcome(approved.run_id(), PrOutcome::Merged)
        .await
        .expect("outcome stored");

    let metrics = MetricsCollector::new(repository, Arc::new(DefaultClock))
        .compute()
        .await
        .expect("metrics computed");

    assert_eq!(metrics.pr_approval_rate.numerator, 1);
    assert_eq!(metrics.pr_approval_rate.denominator, 1);
    assert!(metrics.pr_approval_rate.meets_target);
    assert_eq!(metrics.error_free_streak.streak, 1);
    assert!(!metrics.all_targets_met());
}
