//! Drafts tests for the proposed change.

use super::{
    StageDependencies,
    support::{PromptTemplate, call_model},
};
use crate::run::{
    domain::{RunState, StageUpdate, TestSuggestions},
    pipeline::{Stage, StageFailure, StageFault, StageId},
};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: PromptTemplate = PromptTemplate {
    name: "test_suggestion",
    schema: "test_suggestions",
    system: "You are a test engineer. Suggest the tests a reviewer would expect for the \
change: happy paths, edge cases and failure modes, using the framework the repository already \
uses.",
    user: "Ticket {{ ticket.ticket_id }}: {{ ticket.title }}\n\n\
## Acceptance criteria\n{{ ticket.acceptance_criteria or \"(none)\" }}\n\n\
## Plan\n{{ plan.summary }}\n\n\
## Proposed changes\n{% if proposal %}{% for change in proposal.file_changes %}- {{ change.change_type }} {{ change.file_path }}: {{ change.rationale }}\n{% endfor %}{% else %}(none)\n{% endif %}\n\
## Existing tests\n{{ repo.existing_test_files | join(\", \") if repo else \"(unknown)\" }}",
};

/// Fills the test suggestion slot.
#[derive(Debug, Clone)]
pub struct TestSuggestionStage {
    deps: StageDependencies,
}

impl TestSuggestionStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Stage for TestSuggestionStage {
    fn id(&self) -> StageId {
        StageId::TestSuggestion
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let Some(ticket) = state.ticket_context() else {
            return Ok(StageFailure::MissingPrecondition("ticket_context").into_update(self.id()));
        };
        let Some(plan) = state.implementation_plan() else {
            return Ok(
                StageFailure::MissingPrecondition("implementation_plan").into_update(self.id())
            );
        };

        let context = json!({
            "ticket": ticket,
            "plan": plan,
            "proposal": state.code_proposal(),
            "repo": state.repo_context(),
        });
        let call =
            call_model::<TestSuggestions>(&self.deps, self.id(), state, &TEMPLATE, &context)
                .await?;
        let update = call.accounting(state);
        match call.outcome {
            Ok(tests) => Ok(update
                .with_phase(self.id().phase())
                .with_test_suggestions(tests)),
            Err(failure) => Ok(update.with_failure(self.id().as_str(), failure)),
        }
    }
}
