//! Updates stored pull request outcomes from the code host.

use crate::audit::{
    ActivityLogger,
    domain::{ActivityEvent, ActivityScope},
};
use crate::run::{
    domain::PrOutcome,
    ports::{
        CodeHost, PullRequestState, PullRequestStatus, ReviewState, RunRepository,
        RunRepositoryResult,
    },
};
use std::sync::Arc;
use tracing::{info, warn};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Pending runs whose pull request was looked up.
    pub checked: usize,
    /// Runs whose outcome changed.
    pub updated: usize,
    /// Lookups or writes that failed.
    pub failed: usize,
}

/// Maps a pull request's review status to a stored outcome.
///
/// Merged wins over closed, and closed without merging counts as rejected.
/// An open pull request with any approving review counts as approved.
#[must_use]
pub fn outcome_from_status(status: &PullRequestStatus) -> PrOutcome {
    if status.merged {
        PrOutcome::Merged
    } else if status.state == PullRequestState::Closed {
        PrOutcome::Rejected
    } else if status.reviews.contains(&ReviewState::Approved) {
        PrOutcome::Approved
    } else {
        PrOutcome::Pending
    }
}

/// Polls the code host for runs whose pull request outcome is pending.
#[derive(Clone)]
pub struct PrReconciler<R>
where
    R: RunRepository,
{
    repository: Arc<R>,
    code_host: Arc<dyn CodeHost>,
    activity: ActivityLogger,
}

impl<R> PrReconciler<R>
where
    R: RunRepository,
{
    /// Creates a reconciler.
    #[must_use]
    pub fn new(repository: Arc<R>, code_host: Arc<dyn CodeHost>, activity: ActivityLogger) -> Self {
        Self {
            repository,
            code_host,
            activity,
        }
    }

    /// Checks every pending run once.
    ///
    /// A failed lookup or write is logged and leaves that run pending.
    ///
    /// # Errors
    ///
    /// Returns the repository error when pending runs cannot be listed.
    pub async fn reconcile(&self) -> RunRepositoryResult<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        for run in self.repository.pending_pr_runs().await? {
            let Some(number) = run.pr_number else {
                continue;
            };
            summary.checked += 1;
            let status = match self.code_host.pull_request_status(number).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(run_id = %run.run_id, pr_number = number, error = %err, "pull request lookup failed");
                    summary.failed += 1;
                    continue;
                }
            };
            let outcome = outcome_from_status(&status);
            if outcome == PrOutcome::Pending {
                continue;
            }
            if let Err(err) = self.repository.set_pr_outcome(run.run_id, outcome).await {
                warn!(run_id = %run.run_id, error = %err, "failed to store pull request outcome");
                summary.failed += 1;
                continue;
            }
            info!(run_id = %run.run_id, pr_number = number, outcome = %outcome, "pull request outcome updated");
            self.activity.emit(
                ActivityEvent::info("pr_outcome_updated")
                    .scoped(&ActivityScope::run(
                        run.run_id.to_string(),
                        run.ticket_id.as_str(),
                    ))
                    .with_field("pr_number", number)
                    .with_field("outcome", outcome.as_str()),
            );
            summary.updated += 1;
        }
        Ok(summary)
    }
}
