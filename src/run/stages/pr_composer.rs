//! Opens a pull request carrying the proposal.

use super::{StageDependencies, support::render};
use crate::audit::domain::ActivityEvent;
use crate::run::{
    domain::{
        PrComposition, PrCompositionStatus, RunState, StageUpdate, TicketId, ToolCallRecord,
    },
    pipeline::{Stage, StageFailure, StageFault, StageId},
    ports::NewPullRequest,
};
use async_trait::async_trait;
use serde_json::json;

const BRANCH_PREFIX: &str = "pipewright";
const SLUG_MAX_CHARS: usize = 40;

const BODY: &str = "## Summary
{{ proposal.summary }}

Resolves {{ ticket.ticket_id }}.
{% if plan %}
## Plan
{% for step in plan.steps %}{{ step.step_number }}. **{{ step.title }}** {{ step.description }}
{% endfor %}
**Risk:** {{ plan.risk_level }}{% if plan.risk_rationale %} ({{ plan.risk_rationale }}){% endif %}
{% endif %}
## Changes
{% for change in proposal.file_changes %}- `{{ change.file_path }}` ({{ change.change_type }}){% if change.rationale %}: {{ change.rationale }}{% endif %}
{% endfor %}{% if tests and tests.test_cases %}
## Suggested tests
{% for case in tests.test_cases %}- `{{ case.test_name }}` ({{ case.test_kind }}): {{ case.description }}
{% endfor %}{% endif %}{% if docs and docs.doc_update_suggestions %}
## Documentation to update
{% for suggestion in docs.doc_update_suggestions %}- {{ suggestion }}
{% endfor %}{% endif %}{% if proposal.caveats %}
## Caveats
{% for caveat in proposal.caveats %}- {{ caveat }}
{% endfor %}{% endif %}
_Generated automatically; review carefully before merging._";

/// Returns the head branch name for a ticket and title.
///
/// The title is reduced to a lowercase hyphenated slug of at most
/// forty characters.
#[must_use]
pub fn branch_name_for(ticket_id: &TicketId, title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let bounded: String = slug.chars().take(SLUG_MAX_CHARS).collect();
    let trimmed = bounded.trim_end_matches('-');
    let ticket = ticket_id.as_str().to_ascii_lowercase();
    if trimmed.is_empty() {
        format!("{BRANCH_PREFIX}/{ticket}")
    } else {
        format!("{BRANCH_PREFIX}/{ticket}-{trimmed}")
    }
}

/// Fills the pull request slot.
///
/// In dry-run mode the pull request is composed but not opened.
#[derive(Debug, Clone)]
pub struct PrComposerStage {
    deps: StageDependencies,
}

impl PrComposerStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Stage for PrComposerStage {
    fn id(&self) -> StageId {
        StageId::PrComposer
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let Some(ticket) = state.ticket_context() else {
            return Ok(StageFailure::MissingPrecondition("ticket_context").into_update(self.id()));
        };
        let Some(proposal) = state.code_proposal() else {
            return Ok(StageFailure::MissingPrecondition("code_proposal").into_update(self.id()));
        };

        let settings = &self.deps.config.repository;
        let body = render(
            BODY,
            &json!({
                "ticket": ticket,
                "proposal": proposal,
                "plan": state.implementation_plan(),
                "tests": state.test_suggestions(),
                "docs": state.docs_context(),
            }),
        )?;
        let request = NewPullRequest {
            title: format!("[{}] {}", ticket.ticket_id, ticket.fields.title),
            body,
            head_branch: branch_name_for(&ticket.ticket_id, &ticket.fields.title),
            base_branch: settings.base_branch.clone(),
            draft: settings.draft_pull_requests,
            reviewers: settings.default_reviewers.clone(),
            file_changes: proposal.file_changes.clone(),
        };
        let mut composition = PrComposition {
            status: PrCompositionStatus::Skipped,
            pr_url: None,
            pr_number: None,
            branch_name: request.head_branch.clone(),
            base_branch: request.base_branch.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            draft: request.draft,
            reviewers_requested: request.reviewers.clone(),
        };
        let update = StageUpdate::new();

        if self.deps.config.dry_run {
            self.deps.activity.for_component(self.id().as_str()).emit(
                ActivityEvent::info("pull_request_skipped")
                    .scoped(&state.activity_scope())
                    .with_field("reason", "dry_run")
                    .with_field("branch", composition.branch_name.as_str()),
            );
            return Ok(update
                .with_phase(self.id().phase())
                .with_pr_result(composition));
        }

        match self.deps.code_host.create_pull_request(&request).await {
            Ok(created) => {
                composition.status = PrCompositionStatus::Created;
                composition.pr_url = Some(created.url.clone());
                composition.pr_number = Some(created.number);
                self.deps.activity.for_component(self.id().as_str()).emit(
                    ActivityEvent::info("pull_request_created")
                        .scoped(&state.activity_scope())
                        .with_field("pr_number", created.number)
                        .with_field("pr_url", created.url.as_str()),
                );
                Ok(update
                    .with_phase(self.id().phase())
                    .with_tool_call(ToolCallRecord::new(
                        self.id().as_str(),
                        "pull_request_create",
                        json!({ "branch": composition.branch_name, "number": created.number }),
                    ))
                    .with_pr_result(composition))
            }
            Err(err) => {
                composition.status = PrCompositionStatus::Failed;
                Ok(update
                    .with_tool_call(ToolCallRecord::new(
                        self.id().as_str(),
                        "pull_request_create",
                        json!({ "branch": composition.branch_name, "error": err.to_string() }),
                    ))
                    .with_pr_result(composition)
                    .with_failure(self.id().as_str(), StageFailure::ExternalCall(err)))
            }
        }
    }
}
