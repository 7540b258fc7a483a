//! Aggregate queries behind the pipeline KPIs.

use super::RunRepositoryResult;
use async_trait::async_trait;
use serde::Serialize;

/// Pull request outcome tallies across all runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrOutcomeCounts {
    /// Runs that opened a pull request.
    pub created: u64,
    /// Pull requests approved or merged.
    pub approved: u64,
    /// Pull requests approved, merged or rejected.
    pub resolved: u64,
}

/// Completeness detection tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionCounts {
    /// Distinct tickets with at least one run.
    pub tickets_processed: u64,
    /// Runs that judged their ticket incomplete.
    pub flagged_incomplete: u64,
    /// Ground-truth labels marking a ticket truly incomplete.
    pub labelled_incomplete: u64,
    /// Distinct tickets both flagged and labelled incomplete.
    pub true_positives: u64,
}

/// Averages and counts over finalized runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunSummaryStats {
    /// Mean duration of runs with a recorded duration.
    pub average_duration_seconds: Option<f64>,
    /// Mean token usage of runs that consumed tokens.
    pub average_tokens_per_run: Option<f64>,
    /// Runs finalized with a complete verdict.
    pub complete_runs: u64,
    /// Runs finalized with an incomplete verdict.
    pub incomplete_runs: u64,
}

/// Read-only aggregate access to run history.
#[async_trait]
pub trait RunMetricsSource: Send + Sync {
    /// Counts pull request outcomes.
    async fn pr_outcome_counts(&self) -> RunRepositoryResult<PrOutcomeCounts>;

    /// Counts completeness detections against ground truth.
    async fn detection_counts(&self) -> RunRepositoryResult<DetectionCounts>;

    /// Returns one flag per run, ordered by start time ascending, that is
    /// `true` when the run recorded an error or failed.
    async fn error_flags_by_start(&self) -> RunRepositoryResult<Vec<bool>>;

    /// Returns run averages and verdict counts.
    async fn run_summary(&self) -> RunRepositoryResult<RunSummaryStats>;
}
