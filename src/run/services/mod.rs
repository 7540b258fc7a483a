//! Application services for run orchestration.

mod metrics;
mod orchestrator;
mod reconciler;

pub use metrics::{
    APPROVAL_RATE_TARGET, DETECTION_RATE_TARGET, ERROR_FREE_STREAK_TARGET, MetricsCollector,
    PipelineMetrics, RateKpi, StreakKpi, SupportingMetrics, trailing_error_free_streak,
};
pub use orchestrator::RunOrchestrator;
pub use reconciler::{PrReconciler, ReconcileSummary, outcome_from_status};
