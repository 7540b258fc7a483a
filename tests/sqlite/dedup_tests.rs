//! Processed-ticket markers against `SQLite`.

use crate::sqlite::helpers::{TestDatabase, at, database, ticket};
use pipewright::run::{domain::RunId, ports::RunRepository};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_ticket_is_not_processed(database: TestDatabase) {
    let repository = &database.repository;

    let processed = repository
        .is_ticket_processed(&ticket("OPS-1"))
        .await
        .expect("marker lookup");

    assert!(!processed);
    assert!(
        repository
            .find_marker(&ticket("OPS-1"))
            .await
            .expect("marker lookup")
            .is_none()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn requeue_keeps_first_sighting_and_tracks_last_run(database: TestDatabase) {
    let repository = &database.repository;
    let key = ticket("OPS-2");
    let first = RunId::new();
    let second = RunId::new();

    repository
        .mark_ticket_queued(&key, first, at(0))
        .await
        .expect("first mark");
    repository
        .mark_ticket_queued(&key, second, at(30))
        .await
        .expect("second mark");

    let marker = repository
        .find_marker(&key)
        .await
        .expect("marker lookup")
        .expect("marker present");
    assert_eq!(marker.first_seen_at, at(0));
    assert_eq!(marker.last_run_id, Some(second));
    assert!(!marker.reprocess_requested);
    assert!(repository.is_ticket_processed(&key).await.expect("lookup"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reprocess_request_reopens_until_next_run(database: TestDatabase) {
    let repository = &database.repository;
    let key = ticket("OPS-3");
    repository
        .mark_ticket_queued(&key, RunId::new(), at(0))
        .await
        .expect("mark");

    repository.request_reprocess(&key).await.expect("reprocess");
    assert!(!repository.is_ticket_processed(&key).await.expect("lookup"));

    repository
        .mark_ticket_queued(&key, RunId::new(), at(10))
        .await
        .expect("mark again");
    assert!(repository.is_ticket_processed(&key).await.expect("lookup"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reprocess_without_marker_is_a_no_op(database: TestDatabase) {
    let repository = &database.repository;
    let key = ticket("OPS-4");

    repository.request_reprocess(&key).await.expect("reprocess");

    assert!(repository.find_marker(&key).await.expect("lookup").is_none());
}
