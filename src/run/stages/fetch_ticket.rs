//! Loads the ticket from the issue tracker.

use super::StageDependencies;
use crate::run::{
    domain::{RunState, StageUpdate, TicketContext, ToolCallRecord},
    pipeline::{Stage, StageFailure, StageFault, StageId},
};
use async_trait::async_trait;
use serde_json::json;

/// Fills the ticket slot.
#[derive(Debug, Clone)]
pub struct FetchTicketStage {
    deps: StageDependencies,
}

impl FetchTicketStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Stage for FetchTicketStage {
    fn id(&self) -> StageId {
        StageId::FetchTicket
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let ticket_id = state.ticket_id();
        let call = ToolCallRecord::new(
            self.id().as_str(),
            "ticket_fetch",
            json!({ "ticket_id": ticket_id.as_str() }),
        );
        let fields = match self.deps.tickets.fetch(ticket_id).await {
            Ok(fields) => fields,
            Err(err) => {
                return Ok(StageFailure::ExternalCall(err)
                    .into_update(self.id())
                    .with_tool_call(call));
            }
        };
        let context = TicketContext {
            ticket_id: ticket_id.clone(),
            fields,
            fetched_at: self.deps.clock.utc(),
        };
        Ok(StageUpdate::new()
            .with_phase(self.id().phase())
            .with_ticket_context(context)
            .with_tool_call(call))
    }
}
