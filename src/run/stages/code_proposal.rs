//! Drafts the code changes for the plan.

use super::{
    StageDependencies,
    support::{PromptTemplate, call_model},
};
use crate::run::{
    domain::{CodeProposal, RunState, StageUpdate},
    pipeline::{Stage, StageFailure, StageFault, StageId},
};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: PromptTemplate = PromptTemplate {
    name: "code_proposal",
    schema: "code_proposal",
    system: "You are a senior engineer implementing a plan. Produce minimal, reviewable \
changes as unified diffs against the existing files, or full content for new files. Follow \
the repository's conventions and call out anything you could not verify.",
    user: "Ticket {{ ticket.ticket_id }}: {{ ticket.title }}\n\n\
## Plan\n{{ plan.summary }}\n\
{% for step in plan.steps %}{{ step.step_number }}. {{ step.title }}: {{ step.description }} (files: {{ step.affected_files | join(\", \") }})\n{% endfor %}\n\
## Conventions\n{{ repo.code_style_hints if repo and repo.code_style_hints else \"(none recorded)\" }}",
};

/// Fills the code proposal slot.
#[derive(Debug, Clone)]
pub struct CodeProposalStage {
    deps: StageDependencies,
}

impl CodeProposalStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Stage for CodeProposalStage {
    fn id(&self) -> StageId {
        StageId::CodeProposal
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

        let context = json!({ "ticket": ticket, "plan": plan, "repo": state.repo_context() });
        let call =
            call_model::<CodeProposal>(&self.deps, self.id(), state, &TEMPLATE, &context).await?;
        let update = call.accounting(state);
        match call.outcome {
            Ok(proposal) if proposal.file_changes.is_empty() => Ok(update.with_failure(
                self.id().as_str(),
                StageFailure::OutputValidation("proposal changes no files".to_owned()),
            )),
            Ok(proposal) => Ok(update
                .with_phase(self.id().phase())
                .with_code_proposal(proposal)),
            Err(failure) => Ok(update.with_failure(self.id().as_str(), failure)),
        }
    }
}
