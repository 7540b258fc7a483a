//! Key performance indicators derived from the stored run history.

use crate::run::ports::{RunMetricsSource, RunRepositoryResult};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;

/// Minimum share of resolved pull requests that should be approved.
pub const APPROVAL_RATE_TARGET: f64 = 0.33;

/// Minimum share of truly incomplete tickets the check should flag.
pub const DETECTION_RATE_TARGET: f64 = 0.50;

/// Minimum number of most recent runs that should be error-free.
pub const ERROR_FREE_STREAK_TARGET: u64 = 10;

/// A KPI expressed as a ratio of two counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateKpi {
    /// Ratio in `[0, 1]`, zero when the denominator is zero.
    pub rate: f64,
    /// Threshold the rate is compared against.
    pub target: f64,
    /// Whether `rate >= target`.
    pub meets_target: bool,
    /// Counted successes.
    pub numerator: u64,
    /// Counted population.
    pub denominator: u64,
    /// Explanation when the rate cannot be computed yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RateKpi {
    fn new(numerator: u64, denominator: u64, target: f64, empty_note: &str) -> Self {
        let rate = ratio(numerator, denominator);
        Self {
            rate,
            target,
            meets_target: denominator > 0 && rate >= target,
            numerator,
            denominator,
            note: (denominator == 0).then(|| empty_note.to_owned()),
        }
    }
}

/// Trailing error-free run streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakKpi {
    /// Error-free runs at the end of the history.
    pub streak: u64,
    /// Threshold the streak is compared against.
    pub target: u64,
    /// Whether `streak >= target`.
    pub meets_target: bool,
    /// Runs considered.
    pub total_runs: u64,
}

/// Context reported alongside the KPIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportingMetrics {
    /// Runs that opened a pull request.
    pub prs_created: u64,
    /// Distinct tickets with at least one run.
    pub tickets_processed: u64,
    /// Runs that judged their ticket incomplete.
    pub flagged_incomplete: u64,
    /// Runs that completed with a complete ticket.
    pub complete_pipeline_runs: u64,
    /// Runs that completed with an incomplete ticket.
    pub incomplete_runs: u64,
    /// Mean finalized run duration.
    pub average_duration_seconds: Option<f64>,
    /// Mean tokens over runs that used any.
    pub average_tokens_per_run: Option<f64>,
}

/// Snapshot of all KPIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineMetrics {
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
    /// Approved or merged over all resolved pull requests.
    pub pr_approval_rate: RateKpi,
    /// Flagged-and-labelled over all labelled-incomplete tickets.
    pub incomplete_detection_rate: RateKpi,
    /// Trailing error-free streak.
    pub error_free_streak: StreakKpi,
    /// Supporting counters and averages.
    pub supporting: SupportingMetrics,
}

impl PipelineMetrics {
    /// Returns `true` when every KPI meets its target.
    #[must_use]
    pub const fn all_targets_met(&self) -> bool {
        self.pr_approval_rate.meets_target
            && self.incomplete_detection_rate.meets_target
            && self.error_free_streak.meets_target
    }

    /// Renders the snapshot as pretty-printed JSON for export or serving.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error, which only arises for non-finite
    /// averages.
    pub fn to_report_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Returns the number of error-free runs at the end of `had_error`, which
/// lists one flag per run in ascending start order.
#[must_use]
pub fn trailing_error_free_streak(had_error: &[bool]) -> u64 {
    let streak = had_error.iter().rev().take_while(|errored| !**errored).count();
    u64::try_from(streak).unwrap_or(u64::MAX)
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "rates are reported as floating-point values"
)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// Computes KPI snapshots from a metrics source.
#[derive(Clone)]
pub struct MetricsCollector<M, C>
where
    M: RunMetricsSource,
    C: Clock + Send + Sync,
{
    source: Arc<M>,
    clock: Arc<C>,
}

impl<M, C> MetricsCollector<M, C>
where
    M: RunMetricsSource,
    C: Clock + Send + Sync,
{
    /// Creates a collector.
    #[must_use]
    pub const fn new(source: Arc<M>, clock: Arc<C>) -> Self {
        Self { source, clock }
    }

    /// Computes every KPI.
    ///
    /// # Errors
    ///
    /// Returns the repository error when any aggregate query fails.
    pub async fn compute(&self) -> RunRepositoryResult<PipelineMetrics> {
        let outcomes = self.source.pr_outcome_counts().await?;
        let detection = self.source.detection_counts().await?;
        let flags = self.source.error_flags_by_start().await?;
        let summary = self.source.run_summary().await?;

        let streak = trailing_error_free_streak(&flags);
        Ok(PipelineMetrics {
            computed_at: self.clock.utc(),
            pr_approval_rate: RateKpi::new(
                outcomes.approved,
                outcomes.resolved,
                APPROVAL_RATE_TARGET,
                "no pull request has been approved, merged or rejected yet",
            ),
            incomplete_detection_rate: RateKpi::new(
                detection.true_positives,
                detection.labelled_incomplete,
                DETECTION_RATE_TARGET,
                "no ground-truth labels marking a ticket incomplete yet",
            ),
            error_free_streak: StreakKpi {
                streak,
                target: ERROR_FREE_STREAK_TARGET,
                meets_target: streak >= ERROR_FREE_STREAK_TARGET,
                total_runs: u64::try_from(flags.len()).unwrap_or(u64::MAX),
            },
            supporting: SupportingMetrics {
                prs_created: outcomes.created,
                tickets_processed: detection.tickets_processed,
                flagged_incomplete: detection.flagged_incomplete,
                complete_pipeline_runs: summary.complete_runs,
                incomplete_runs: summary.incomplete_runs,
                average_duration_seconds: summary.average_duration_seconds,
                average_tokens_per_run: summary.average_tokens_per_run,
            },
        })
    }
}
