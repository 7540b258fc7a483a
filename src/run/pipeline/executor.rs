//! Drives a run through the pipeline graph.

use super::{PipelineGraph, StageFault, StageId, StageRegistry};
use crate::audit::{ActivityLogger, domain::ActivityEvent};
use crate::run::domain::{RunPhase, RunState, RunStateKey, StageUpdate};
use futures::FutureExt;
use mockable::Clock;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Errors raised while assembling an executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// A stage named by the graph has no registered implementation.
    #[error("no stage registered for {0}")]
    MissingStage(StageId),
}

/// Walks the graph from its entry stage to its terminal stage.
#[derive(Debug, Clone)]
pub struct Executor {
    graph: PipelineGraph,
    stages: StageRegistry,
    activity: ActivityLogger,
}

impl Executor {
    /// Creates an executor after checking every graph stage is registered.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::MissingStage`] for the first stage without an
    /// implementation.
    pub fn new(
        graph: PipelineGraph,
        stages: StageRegistry,
        activity: ActivityLogger,
    ) -> Result<Self, ExecutorError> {
        if let Some(missing) = graph.stages().into_iter().find(|id| !stages.contains(*id)) {
            return Err(ExecutorError::MissingStage(missing));
        }
        Ok(Self {
            graph,
            stages,
            activity,
        })
    }

    /// Returns the graph this executor walks.
    #[must_use]
    pub const fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Runs every stage on the path chosen by the graph and returns the final
    /// state.
    ///
    /// Never fails. A stage fault or panic is recorded as a failure on the
    /// state and the run jumps straight to the terminal stage. Once the stop
    /// flag is raised, stages that need a healthy run are skipped in favour
    /// of the terminal stage. `clock` stamps the completion time when the
    /// terminal stage did not.
    pub async fn execute<C>(&self, initial: RunState, clock: &C) -> RunState
    where
        C: Clock + Send + Sync + ?Sized,
    {
        let mut state = initial;
        let mut current = self.graph.entry();
        loop {
            if state.should_stop() && current.requires_healthy_run() {
                self.stage_skipped(&state, current);
                current = self.graph.terminal();
            }
            self.stage_entered(&state, current);
            match self.invoke(current, &state).await {
                Ok(update) => {
                    let keys = state.apply(update);
                    self.stage_completed(&state, current, &keys);
                }
                Err(fault) => {
                    self.stage_faulted(&state, current, &fault);
                    state.apply(StageUpdate::failed(current.as_str(), &fault));
                    if current == self.graph.terminal() {
                        break;
                    }
                    current = self.graph.terminal();
                    continue;
                }
            }
            match self.graph.next(current, &state) {
                Some(next) => current = next,
                None => break,
            }
        }
        if state.completed_at().is_none() {
            state.apply(StageUpdate::new().with_completed_at(clock.utc()));
        }
        state
    }

    async fn invoke(&self, id: StageId, state: &RunState) -> Result<StageUpdate, StageFault> {
        let stage = self.stages.get(id).ok_or(StageFault::Unregistered(id))?;
        AssertUnwindSafe(stage.run(state))
            .catch_unwind()
            .await
            .map_err(|payload| StageFault::from_panic(payload.as_ref()))?
    }

    fn stage_skipped(&self, state: &RunState, stage: StageId) {
        tracing::debug!(run_id = %state.run_id(), stage = %stage, "skipping stage after stop");
        self.activity.emit(
            ActivityEvent::info("stage_skipped")
                .scoped(&state.activity_scope())
                .with_field("stage", stage.as_str()),
        );
    }

    fn stage_entered(&self, state: &RunState, stage: StageId) {
        tracing::debug!(run_id = %state.run_id(), stage = %stage, "entering stage");
        self.activity.emit(
            ActivityEvent::info("stage_entered")
                .scoped(&state.activity_scope())
                .with_field("stage", stage.as_str()),
        );
    }

    fn stage_completed(&self, state: &RunState, stage: StageId, keys: &[RunStateKey]) {
        let updated: Vec<&str> = keys.iter().map(|key| key.as_str()).collect();
        let failed = state.current_phase() == RunPhase::Failed;
        let event = if failed {
            ActivityEvent::warning("stage_completed")
        } else {
            ActivityEvent::info("stage_completed")
        };
        self.activity.emit(
            event
                .scoped(&state.activity_scope())
                .with_field("stage", stage.as_str())
                .with_field("updated_keys", updated)
                .with_field("phase", state.current_phase().as_str())
                .with_field("error_count", state.errors().len()),
        );
    }

    fn stage_faulted(&self, state: &RunState, stage: StageId, fault: &StageFault) {
        tracing::error!(run_id = %state.run_id(), stage = %stage, error = %fault, "stage faulted");
        self.activity.emit(
            ActivityEvent::error("stage_faulted")
                .scoped(&state.activity_scope())
                .with_message(format!("{stage} faulted: {fault}"))
                .with_field("stage", stage.as_str())
                .with_field("error", fault.to_string()),
        );
    }
}
