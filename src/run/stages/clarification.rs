//! Posts a clarification request on tickets that cannot proceed.

use super::{StageDependencies, support::render};
use crate::audit::domain::ActivityEvent;
use crate::run::{
    domain::{RunPhase, RunState, StageUpdate, TicketId, ToolCallRecord},
    pipeline::{Stage, StageFailure, StageFault, StageId},
};
use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

const ASSESSED_COMMENT: &str = "**Clarification required before development can start**

This ticket was reviewed automatically and needs more information.
**Completeness score: {{ (result.completeness_score * 100) | round | int }}%**
{% if result.missing_fields %}
**Missing or insufficient fields:**
{% for field in result.missing_fields %}- **{{ field.field_name }}** ({{ field.severity }}): {{ field.description }}
{% endfor %}{% endif %}{% if result.clarification_questions %}
**Please answer the following questions:**
{% for question in result.clarification_questions %}{{ loop.index }}. {{ question }}
{% endfor %}{% endif %}{% if result.assumptions_summary %}
**Assumptions made:** {{ result.assumptions_summary }}
{% endif %}
_Once the information is added, remove the `{{ label }}` label to resume automated processing._";

const UNASSESSED_COMMENT: &str = "**Automated review could not assess this ticket**

The ticket could not be evaluated for completeness, so no changes were proposed.
{% if errors %}
**Problems encountered:**
{% for error in errors %}- {{ error }}
{% endfor %}{% endif %}
_Please check that the ticket has a title, a description and acceptance criteria, then \
remove the `{{ label }}` label to retry._";

/// Returns the hidden marker embedded in a clarification comment body.
///
/// The marker covers the ticket and the set of missing field names, so a
/// re-run that flags the same gaps finds its earlier comment even when the
/// model words the questions differently.
#[must_use]
pub fn clarification_marker<'a>(
    ticket_id: &TicketId,
    missing_fields: impl IntoIterator<Item = &'a str>,
) -> String {
    let fields: BTreeSet<&str> = missing_fields.into_iter().collect();
    let mut hasher = Sha256::new();
    hasher.update(ticket_id.as_str().as_bytes());
    for field in fields {
        hasher.update(b"\n");
        hasher.update(field.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    let short: String = digest.chars().take(16).collect();
    format!("<!-- pipewright:clarification:{short} -->")
}

/// Comments on the ticket and applies the clarification label.
///
/// Runs both for incomplete tickets and for runs that stopped before the
/// completeness check; in the second case a generic comment listing the
/// recorded errors is posted. A failed run keeps its failed phase.
#[derive(Debug, Clone)]
pub struct PostClarificationStage {
    deps: StageDependencies,
}

impl PostClarificationStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }

    fn comment_body(&self, state: &RunState) -> Result<String, StageFault> {
        let label = &self.deps.config.clarification_label;
        match state.completeness_result() {
            Some(result) => render(ASSESSED_COMMENT, &json!({ "result": result, "label": label })),
            None => render(
                UNASSESSED_COMMENT,
                &json!({ "errors": state.errors(), "label": label }),
            ),
        }
    }
}

#[async_trait]
impl Stage for PostClarificationStage {
    fn id(&self) -> StageId {
        StageId::PostClarification
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let activity = self.deps.activity.for_component(self.id().as_str());
        let scope = state.activity_scope();
        let body = self.comment_body(state)?;
        let missing = state
            .completeness_result()
            .map(|result| result.missing_fields.as_slice())
            .unwrap_or_default();
        let marker = clarification_marker(
            state.ticket_id(),
            missing.iter().map(|field| field.field_name.as_str()),
        );
        let comment = format!("{body}\n\n{marker}");

        let mut update = StageUpdate::new();
        if state.current_phase() != RunPhase::Failed {
            update = update.with_phase(self.id().phase());
        }

        if self.deps.config.dry_run {
            activity.emit(
                ActivityEvent::info("clarification_skipped")
                    .scoped(&scope)
                    .with_field("reason", "dry_run"),
            );
            return Ok(update);
        }

        let existing = state.ticket_context().and_then(|ticket| {
            ticket
                .fields
                .comments
                .iter()
                .find(|posted| posted.body.contains(&marker))
        });
        if let Some(posted) = existing {
            activity.emit(
                ActivityEvent::info("clarification_skipped")
                    .scoped(&scope)
                    .with_field("reason", "already_posted")
                    .with_field("comment_id", posted.id.clone()),
            );
            let mut reused_update = update.with_tool_call(ToolCallRecord::new(
                self.id().as_str(),
                "ticket_comment_reused",
                json!({ "comment_id": posted.id, "marker": marker }),
            ));
            if let Some(result) = state.completeness_result() {
                let mut reused = result.clone();
                reused.comment_posted = true;
                reused.comment_id.clone_from(&posted.id);
                reused_update = reused_update.with_completeness_result(reused);
            }
            return Ok(reused_update);
        }

        let ticket_id = state.ticket_id();
        let comment_id = match self.deps.tickets.post_comment(ticket_id, &comment).await {
            Ok(comment_id) => comment_id,
            Err(err) => {
                return Ok(update
                    .with_tool_call(ToolCallRecord::new(
                        self.id().as_str(),
                        "ticket_comment",
                        json!({ "posted": false }),
                    ))
                    .with_failure(self.id().as_str(), StageFailure::ExternalCall(err)));
            }
        };
        let mut posted_update = update.with_tool_call(ToolCallRecord::new(
            self.id().as_str(),
            "ticket_comment",
            json!({ "posted": true, "comment_id": comment_id }),
        ));
        if let Some(result) = state.completeness_result() {
            let mut posted = result.clone();
            posted.comment_posted = true;
            posted.comment_id.clone_from(&comment_id);
            posted_update = posted_update.with_completeness_result(posted);
        }
        activity.emit(
            ActivityEvent::info("clarification_posted")
                .scoped(&scope)
                .with_field("comment_id", comment_id),
        );

        let label = &self.deps.config.clarification_label;
        let labelled = self.deps.tickets.apply_label(ticket_id, label).await;
        let label_call = ToolCallRecord::new(
            self.id().as_str(),
            "ticket_label",
            json!({ "label": label, "applied": labelled.is_ok() }),
        );
        match labelled {
            Ok(()) => Ok(posted_update.with_tool_call(label_call)),
            Err(err) => Ok(posted_update
                .with_tool_call(label_call)
                .with_failure(self.id().as_str(), StageFailure::ExternalCall(err))),
        }
    }
}
