//! Aggregate KPI queries over the `SQLite` run history.

use super::{
    repository::SqliteRunRepository,
    schema::{ticket_ground_truth, ticket_runs},
};
use crate::run::{
    domain::{PrOutcome, RunStatus},
    ports::{DetectionCounts, PrOutcomeCounts, RunMetricsSource, RunRepositoryResult, RunSummaryStats},
};
use async_trait::async_trait;
use diesel::dsl::{avg, count, sql};
use diesel::expression_methods::AggregateExpressionMethods;
use diesel::prelude::*;
use diesel::sql_types::{Double, Nullable};
use diesel::sqlite::SqliteConnection;

fn count_of(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn status_count(connection: &mut SqliteConnection, status: RunStatus) -> QueryResult<i64> {
    ticket_runs::table
        .filter(ticket_runs::status.eq(status.as_str()))
        .count()
        .get_result(connection)
}

#[async_trait]
impl RunMetricsSource for SqliteRunRepository {
    async fn pr_outcome_counts(&self) -> RunRepositoryResult<PrOutcomeCounts> {
        self.run_blocking(|connection| {
            connection.transaction(|tx| {
                let created: i64 = ticket_runs::table
                    .filter(ticket_runs::pr_url.is_not_null())
                    .count()
                    .get_result(tx)?;
                let approved: i64 = ticket_runs::table
                    .filter(ticket_runs::pr_outcome.eq_any(vec![
                        PrOutcome::Approved.as_str(),
                        PrOutcome::Merged.as_str(),
                    ]))
                    .count()
                    .get_result(tx)?;
                let resolved: i64 = ticket_runs::table
                    .filter(ticket_runs::pr_outcome.eq_any(vec![
                        PrOutcome::Approved.as_str(),
                        PrOutcome::Merged.as_str(),
                        PrOutcome::Rejected.as_str(),
                    ]))
                    .count()
                    .get_result(tx)?;
                Ok(PrOutcomeCounts {
                    created: count_of(created),
                    approved: count_of(approved),
                    resolved: count_of(resolved),
                })
            })
        })
        .await
    }

    async fn detection_counts(&self) -> RunRepositoryResult<DetectionCounts> {
        self.run_blocking(|connection| {
            connection.transaction(|tx| {
                let tickets_processed: i64 = ticket_runs::table
                    .select(count(ticket_runs::ticket_id).aggregate_distinct())
                    .get_result(tx)?;
                let flagged_incomplete: i64 = ticket_runs::table
                    .filter(ticket_runs::ticket_deemed_incomplete.eq(true))
                    .count()
                    .get_result(tx)?;
                let labelled_incomplete: i64 = ticket_ground_truth::table
                    .filter(ticket_ground_truth::truly_incomplete.eq(true))
                    .count()
                    .get_result(tx)?;
                let true_positives: i64 = ticket_runs::table
                    .inner_join(ticket_ground_truth::table)
                    .filter(ticket_runs::ticket_deemed_incomplete.eq(true))
                    .filter(ticket_ground_truth::truly_incomplete.eq(true))
                    .select(count(ticket_runs::ticket_id).aggregate_distinct())
                    .get_result(tx)?;
                Ok(DetectionCounts {
                    tickets_processed: count_of(tickets_processed),
                    flagged_incomplete: count_of(flagged_incomplete),
                    labelled_incomplete: count_of(labelled_incomplete),
                    true_positives: count_of(true_positives),
                })
            })
        })
        .await
    }

    async fn error_flags_by_start(&self) -> RunRepositoryResult<Vec<bool>> {
        self.run_blocking(|connection| {
            let rows = ticket_runs::table
                .order((ticket_runs::started_at.asc(), ticket_runs::id.asc()))
                .select((ticket_runs::error_occurred, ticket_runs::status))
                .load::<(bool, String)>(connection)?;
            Ok(rows
                .into_iter()
                .map(|(error_occurred, status)| {
                    error_occurred || status == RunStatus::Failed.as_str()
                })
                .collect())
        })
        .await
    }

    async fn run_summary(&self) -> RunRepositoryResult<RunSummaryStats> {
        self.run_blocking(|connection| {
            connection.transaction(|tx| {
                let average_duration_seconds: Option<f64> = ticket_runs::table
                    .select(avg(ticket_runs::duration_seconds))
                    .get_result(tx)?;
                let average_tokens_per_run: Option<f64> = ticket_runs::table
                    .filter(ticket_runs::token_count.gt(0_i64))
                    .select(sql::<Nullable<Double>>("AVG(CAST(token_count AS REAL))"))
                    .get_result(tx)?;
                Ok(RunSummaryStats {
                    average_duration_seconds,
                    average_tokens_per_run,
                    complete_runs: count_of(status_count(tx, RunStatus::CompletedComplete)?),
                    incomplete_runs: count_of(status_count(tx, RunStatus::CompletedIncomplete)?),
                })
            })
        })
        .await
    }
}
