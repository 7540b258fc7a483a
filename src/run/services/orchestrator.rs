//! Top-level entry point for running the pipeline on a ticket.

use crate::audit::{ActivityLogger, domain::ActivityEvent};
use crate::run::{
    domain::{RunId, RunState, TicketId},
    pipeline::{BridgeError, Executor, block_on},
    ports::{RunRepository, RunRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Creates, executes and records runs.
///
/// Persistence failures are logged and never abort a run: the caller always
/// receives the final state the executor produced.
#[derive(Clone)]
pub struct RunOrchestrator<R, C>
where
    R: RunRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    executor: Arc<Executor>,
    clock: Arc<C>,
    activity: ActivityLogger,
}

impl<R, C> RunOrchestrator<R, C>
where
    R: RunRepository,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        executor: Arc<Executor>,
        clock: Arc<C>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            repository,
            executor,
            clock,
            activity,
        }
    }

    /// Runs the pipeline once for `ticket_id` and returns the final state.
    ///
    /// The run record is created and the ticket's dedup marker updated
    /// before the first stage executes; the record is finalized afterwards.
    pub async fn run_ticket(&self, ticket_id: TicketId) -> RunState {
        let run_id = RunId::new();
        let started_at = self.clock.utc();
        let initial = RunState::new(run_id, ticket_id.clone(), started_at);
        let scope = initial.activity_scope();

        if let Err(err) = self
            .repository
            .create_run(run_id, &ticket_id, started_at)
            .await
        {
            self.persistence_failed(&initial, "create_run", &err);
        }
        if let Err(err) = self
            .repository
            .mark_ticket_queued(&ticket_id, run_id, started_at)
            .await
        {
            self.persistence_failed(&initial, "mark_ticket_queued", &err);
        }

        info!(%run_id, %ticket_id, "run started");
        self.activity
            .emit(ActivityEvent::info("workflow_started").scoped(&scope));

        let final_state = self.executor.execute(initial, self.clock.as_ref()).await;

        if let Err(err) = self
            .repository
            .finalize_run(run_id, &final_state, self.clock.utc())
            .await
        {
            error!(%run_id, %ticket_id, error = %err, "failed to finalize run record");
            self.activity.emit(
                ActivityEvent::error("workflow_finalize_failed")
                    .scoped(&scope)
                    .with_message(err.to_string()),
            );
        }

        info!(
            %run_id,
            %ticket_id,
            phase = %final_state.current_phase(),
            errors = final_state.errors().len(),
            "run finished"
        );
        self.activity.emit(
            ActivityEvent::info("workflow_completed")
                .scoped(&scope)
                .with_field("phase", final_state.current_phase().as_str())
                .with_field("error_count", final_state.errors().len())
                .with_field("llm_calls", final_state.total_llm_calls())
                .with_field("total_tokens", final_state.total_tokens_used()),
        );
        final_state
    }

    /// Blocking variant of [`Self::run_ticket`] for synchronous callers.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when no runtime could be provided for the run.
    pub fn run_ticket_blocking(&self, ticket_id: TicketId) -> Result<RunState, BridgeError> {
        block_on(self.run_ticket(ticket_id))
    }

    /// Runs every ticket whose dedup marker allows it, one after another.
    ///
    /// Tickets already processed are skipped, as are tickets whose marker
    /// cannot be read.
    pub async fn dispatch(
        &self,
        ticket_ids: impl IntoIterator<Item = TicketId>,
    ) -> Vec<RunState> {
        let mut finished = Vec::new();
        for ticket_id in ticket_ids {
            match self.repository.is_ticket_processed(&ticket_id).await {
                Ok(false) => finished.push(self.run_ticket(ticket_id).await),
                Ok(true) => {
                    info!(%ticket_id, "ticket already processed; skipping");
                }
                Err(err) => {
                    warn!(%ticket_id, error = %err, "dedup marker unreadable; skipping ticket");
                }
            }
        }
        finished
    }

    fn persistence_failed(&self, state: &RunState, operation: &str, err: &RunRepositoryError) {
        warn!(
            run_id = %state.run_id(),
            ticket_id = %state.ticket_id(),
            operation,
            error = %err,
            "run bookkeeping failed"
        );
        self.activity.emit(
            ActivityEvent::warning("workflow_persist_failed")
                .scoped(&state.activity_scope())
                .with_field("operation", operation)
                .with_message(err.to_string()),
        );
    }
}
