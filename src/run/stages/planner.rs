//! Produces the implementation plan.

use super::{
    StageDependencies,
    support::{PromptTemplate, call_model},
};
use crate::run::{
    domain::{ImplementationPlan, RunState, StageUpdate},
    pipeline::{Stage, StageFailure, StageFault, StageId},
};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: PromptTemplate = PromptTemplate {
    name: "planner",
    schema: "implementation_plan",
    system: "You are a staff engineer writing an implementation plan. Break the work into \
small ordered steps that each name the files they touch, assess the risk honestly, and state \
any assumptions the plan rests on.",
    user: "Ticket {{ ticket.ticket_id }}: {{ ticket.title }}\n\n\
{{ ticket.description }}\n\n\
## Acceptance criteria\n{{ ticket.acceptance_criteria or \"(none)\" }}\n\n\
## Repository\n{{ repo.repo_owner }}/{{ repo.repo_name }} ({{ repo.primary_language or \"unknown language\" }})\n\
{{ repo.directory_summary }}\n\n\
## Relevant files\n{% for file in repo.relevant_files %}- {{ file.file_path }}: {{ file.relevance_reason }}\n{% else %}(none)\n{% endfor %}\n\
## Documentation\n{{ docs.summary if docs else \"(none)\" }}",
};

/// Fills the plan slot.
#[derive(Debug, Clone)]
pub struct PlannerStage {
    deps: StageDependencies,
}

impl PlannerStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Stage for PlannerStage {
    fn id(&self) -> StageId {
        StageId::Planner
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let Some(ticket) = state.ticket_context() else {
            return Ok(StageFailure::MissingPrecondition("ticket_context").into_update(self.id()));
        };
        let Some(repo) = state.repo_context() else {
            return Ok(StageFailure::MissingPrecondition("repo_context").into_update(self.id()));
        };

        let context = json!({ "ticket": ticket, "repo": repo, "docs": state.docs_context() });
        let call =
            call_model::<ImplementationPlan>(&self.deps, self.id(), state, &TEMPLATE, &context)
                .await?;
        let update = call.accounting(state);
        match call.outcome {
            Ok(plan) if plan.steps.is_empty() => Ok(update.with_failure(
                self.id().as_str(),
                StageFailure::OutputValidation("plan has no steps".to_owned()),
            )),
            Ok(plan) => Ok(update
                .with_phase(self.id().phase())
                .with_implementation_plan(plan)),
            Err(failure) => Ok(update.with_failure(self.id().as_str(), failure)),
        }
    }
}
