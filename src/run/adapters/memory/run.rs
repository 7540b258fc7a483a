//! In-memory run repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::run::{
    domain::{
        GroundTruthLabel, PrOutcome, ProcessedTicketMarker, RunFinalization, RunId, RunRecord,
        RunState, RunStatus, TicketId,
    },
    ports::{
        DetectionCounts, PrOutcomeCounts, RunMetricsSource, RunRepository, RunRepositoryError,
        RunRepositoryResult, RunSummaryStats,
    },
};

/// Thread-safe in-memory run repository.
///
/// Runs are kept in insertion order; ties on start time resolve to that
/// order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRunRepository {
    state: Arc<RwLock<InMemoryRunState>>,
}

#[derive(Debug, Default)]
struct InMemoryRunState {
    runs: Vec<RunRecord>,
    markers: HashMap<TicketId, ProcessedTicketMarker>,
    labels: HashMap<TicketId, GroundTruthLabel>,
}

impl InMemoryRunRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RunRepositoryResult<RwLockReadGuard<'_, InMemoryRunState>> {
        self.state.read().map_err(|err| {
            RunRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> RunRepositoryResult<RwLockWriteGuard<'_, InMemoryRunState>> {
        self.state.write().map_err(|err| {
            RunRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryRunState {
    fn run_mut(&mut self, run_id: RunId) -> RunRepositoryResult<&mut RunRecord> {
        self.runs
            .iter_mut()
            .find(|run| run.run_id == run_id)
            .ok_or(RunRepositoryError::NotFound(run_id))
    }

    fn runs_by_start(&self) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self.runs.iter().collect();
        runs.sort_by_key(|run| (run.started_at, run.run_id));
        runs
    }
}

#[async_trait]
impl RunRepository for InMemoryRunRepository {
    async fn create_run(
        &self,
        run_id: RunId,
        ticket_id: &TicketId,
        started_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        let mut state = self.write()?;
        if state.runs.iter().any(|run| run.run_id == run_id) {
            return Err(RunRepositoryError::DuplicateRun(run_id));
        }
        state
            .runs
            .push(RunRecord::started(run_id, ticket_id.clone(), started_at));
        Ok(())
    }

    async fn mark_ticket_queued(
        &self,
        ticket_id: &TicketId,
        run_id: RunId,
        queued_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        let mut state = self.write()?;
        let marker = state
            .markers
            .entry(ticket_id.clone())
            .or_insert_with(|| ProcessedTicketMarker {
                ticket_id: ticket_id.clone(),
                first_seen_at: queued_at,
                last_run_id: None,
                reprocess_requested: false,
            });
        marker.last_run_id = Some(run_id);
        marker.reprocess_requested = false;
        Ok(())
    }

    async fn is_ticket_processed(&self, ticket_id: &TicketId) -> RunRepositoryResult<bool> {
        let state = self.read()?;
        Ok(state
            .markers
            .get(ticket_id)
            .is_some_and(|marker| !marker.reprocess_requested))
    }

    async fn request_reprocess(&self, ticket_id: &TicketId) -> RunRepositoryResult<()> {
        let mut state = self.write()?;
        if let Some(marker) = state.markers.get_mut(ticket_id) {
            marker.reprocess_requested = true;
        }
        Ok(())
    }

    async fn find_marker(
        &self,
        ticket_id: &TicketId,
    ) -> RunRepositoryResult<Option<ProcessedTicketMarker>> {
        let state = self.read()?;
        Ok(state.markers.get(ticket_id).cloned())
    }

    async fn finalize_run(
        &self,
        run_id: RunId,
        final_state: &RunState,
        finalized_at: DateTime<Utc>,
    ) -> RunRepositoryResult<()> {
        let finalization = RunFinalization::from_state(final_state, finalized_at)
            .map_err(RunRepositoryError::persistence)?;
        let mut state = self.write()?;
        state.run_mut(run_id)?.finalize(finalization)?;
        Ok(())
    }

    async fn find_run(&self, run_id: RunId) -> RunRepositoryResult<Option<RunRecord>> {
        let state = self.read()?;
        Ok(state.runs.iter().find(|run| run.run_id == run_id).cloned())
    }

    async fn runs_for_ticket(&self, ticket_id: &TicketId) -> RunRepositoryResult<Vec<RunRecord>> {
        let state = self.read()?;
        Ok(state
            .runs_by_start()
            .into_iter()
            .filter(|run| &run.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn pending_pr_runs(&self) -> RunRepositoryResult<Vec<RunRecord>> {
        let state = self.read()?;
        Ok(state
            .runs_by_start()
            .into_iter()
            .filter(|run| run.pr_outcome == PrOutcome::Pending)
            .cloned()
            .collect())
    }

    async fn set_pr_outcome(&self, run_id: RunId, outcome: PrOutcome) -> RunRepositoryResult<()> {
        let mut state = self.write()?;
        state.run_mut(run_id)?.pr_outcome = outcome;
        Ok(())
    }

    async fn set_ground_truth(&self, label: &GroundTruthLabel) -> RunRepositoryResult<()> {
        let mut state = self.write()?;
        state.labels.insert(label.ticket_id.clone(), label.clone());
        Ok(())
    }
}

fn count(iter: impl Iterator) -> u64 {
    u64::try_from(iter.count()).unwrap_or(u64::MAX)
}

#[async_trait]
impl RunMetricsSource for InMemoryRunRepository {
    async fn pr_outcome_counts(&self) -> RunRepositoryResult<PrOutcomeCounts> {
        let state = self.read()?;
        Ok(PrOutcomeCounts {
            created: count(state.runs.iter().filter(|run| run.pr_url.is_some())),
            approved: count(state.runs.iter().filter(|run| run.pr_outcome.is_approval())),
            resolved: count(state.runs.iter().filter(|run| run.pr_outcome.is_resolved())),
        })
    }

    async fn detection_counts(&self) -> RunRepositoryResult<DetectionCounts> {
        let state = self.read()?;
        let tickets: HashSet<&TicketId> = state.runs.iter().map(|run| &run.ticket_id).collect();
        let flagged: Vec<&RunRecord> = state
            .runs
            .iter()
            .filter(|run| run.ticket_deemed_incomplete == Some(true))
            .collect();
        let true_positive_tickets: HashSet<&TicketId> = flagged
            .iter()
            .filter(|run| {
                state
                    .labels
                    .get(&run.ticket_id)
                    .is_some_and(|label| label.truly_incomplete)
            })
            .map(|run| &run.ticket_id)
            .collect();
        Ok(DetectionCounts {
            tickets_processed: count(tickets.iter()),
            flagged_incomplete: count(flagged.iter()),
            labelled_incomplete: count(state.labels.values().filter(|label| label.truly_incomplete)),
            true_positives: count(true_positive_tickets.iter()),
        })
    }

    async fn error_flags_by_start(&self) -> RunRepositoryResult<Vec<bool>> {
        let state = self.read()?;
        Ok(state
            .runs_by_start()
            .into_iter()
            .map(RunRecord::had_error)
            .collect())
    }

    async fn run_summary(&self) -> RunRepositoryResult<RunSummaryStats> {
        let state = self.read()?;
        let durations: Vec<f64> = state
            .runs
            .iter()
            .filter_map(|run| run.duration_seconds)
            .collect();
        let tokens: Vec<u64> = state
            .runs
            .iter()
            .map(|run| run.token_count)
            .filter(|tokens| *tokens > 0)
            .collect();
        Ok(RunSummaryStats {
            average_duration_seconds: mean(&durations),
            average_tokens_per_run: mean_u64(&tokens),
            complete_runs: count(
                state
                    .runs
                    .iter()
                    .filter(|run| run.status == RunStatus::CompletedComplete),
            ),
            incomplete_runs: count(
                state
                    .runs
                    .iter()
                    .filter(|run| run.status == RunStatus::CompletedIncomplete),
            ),
        })
    }
}

#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "averages are reported as floating-point values"
)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[expect(
    clippy::cast_precision_loss,
    reason = "token totals stay far below 2^52"
)]
fn mean_u64(values: &[u64]) -> Option<f64> {
    let as_float: Vec<f64> = values.iter().map(|value| *value as f64).collect();
    mean(&as_float)
}
