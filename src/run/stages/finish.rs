//! Terminal stage.

use crate::run::{
    domain::{RunPhase, RunState, StageUpdate},
    pipeline::{Stage, StageFault, StageId},
};
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;

/// Stamps the completion time and settles the final phase.
///
/// A failed run stays failed.
#[derive(Clone)]
pub struct FinishStage {
    clock: Arc<dyn Clock + Send + Sync>,
}

impl FinishStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { clock }
    }
}

impl std::fmt::Debug for FinishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinishStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for FinishStage {
    fn id(&self) -> StageId {
        StageId::Finish
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let update = StageUpdate::new().with_completed_at(self.clock.utc());
        if state.current_phase() == RunPhase::Failed {
            return Ok(update);
        }
        Ok(update.with_phase(RunPhase::Completed))
    }
}
