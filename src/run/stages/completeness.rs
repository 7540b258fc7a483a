//! Scores whether the ticket can be implemented as written.

use super::{
    StageDependencies,
    support::{PromptTemplate, call_model},
};
use crate::run::{
    domain::{CompletenessResult, RunState, StageUpdate},
    pipeline::{Stage, StageFailure, StageFault, StageId},
};
use async_trait::async_trait;
use serde_json::json;

const TEMPLATE: PromptTemplate = PromptTemplate {
    name: "completeness",
    schema: "completeness_result",
    system: "You are a senior engineering lead reviewing tickets before development starts. \
Judge whether a developer could implement the ticket without asking questions. \
A complete ticket has a clear problem statement, acceptance criteria, enough context for \
the expected behaviour, and a bounded scope. Score from 0.0 to 1.0; scores of \
{{ threshold }} and above mean the ticket is complete. Flag only genuinely missing information.",
    user: "Assess ticket {{ ticket.ticket_id }} for completeness.\n\n\
## Title\n{{ ticket.title }}\n\n\
## Description\n{{ ticket.description or \"(none)\" }}\n\n\
## Acceptance criteria\n{{ ticket.acceptance_criteria or \"(none)\" }}\n\n\
## Issue type\n{{ ticket.issue_type or \"(unknown)\" }}\n\n\
## Priority\n{{ ticket.priority or \"(unset)\" }}\n\n\
## Story points\n{{ ticket.story_points if ticket.story_points is not none else \"(unset)\" }}\n\n\
## Labels\n{{ ticket.labels | join(\", \") or \"(none)\" }}\n\n\
## Linked issues\n{{ ticket.linked_issues | join(\", \") or \"(none)\" }}\n\n\
List missing fields with a severity, and if the ticket is incomplete write specific \
clarification questions to post back to the reporter.",
};

/// Fills the completeness slot and the completeness verdict.
///
/// The verdict is complete only when the model says so and the score
/// clears the configured threshold.
#[derive(Debug, Clone)]
pub struct CompletenessCheckStage {
    deps: StageDependencies,
}

impl CompletenessCheckStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Stage for CompletenessCheckStage {
    fn id(&self) -> StageId {
        StageId::CompletenessCheck
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let Some(ticket) = state.ticket_context() else {
            // The fetch failure is already recorded; routing sends the run to
            // clarification.
            if state.should_stop() {
                return Ok(StageUpdate::new());
            }
            return Ok(StageFailure::MissingPrecondition("ticket_context").into_update(self.id()));
        };

        let threshold = self.deps.config.completeness_threshold;
        let context = json!({ "ticket": ticket, "threshold": threshold });
        let call = call_model::<CompletenessResult>(&self.deps, self.id(), state, &TEMPLATE, &context)
            .await?;
        let update = call.accounting(state);
        let result = match call.outcome {
            Ok(result) => result,
            Err(failure) => return Ok(update.with_failure(self.id().as_str(), failure)),
        };
        if !(0.0..=1.0).contains(&result.completeness_score) {
            let failure = StageFailure::OutputValidation(format!(
                "completeness_score {} outside [0, 1]",
                result.completeness_score
            ));
            return Ok(update.with_failure(self.id().as_str(), failure));
        }

        let complete = result.passes(threshold);
        tracing::info!(
            run_id = %state.run_id(),
            score = result.completeness_score,
            complete,
            "completeness assessed"
        );
        Ok(update
            .with_phase(self.id().phase())
            .with_completeness_verdict(complete)
            .with_completeness_result(result))
    }
}
