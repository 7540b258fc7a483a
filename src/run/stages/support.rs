//! Prompt rendering and typed model calls shared by the stages.

use super::StageDependencies;
use crate::audit::domain::ActivityEvent;
use crate::run::{
    domain::{RunState, StageUpdate},
    pipeline::{StageFailure, StageFault, StageId},
    ports::{LlmCallMetadata, StructuredPrompt},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// System and user templates for one model call.
pub(super) struct PromptTemplate {
    pub name: &'static str,
    pub schema: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

/// Renders a template against a serialisable context.
pub(super) fn render(template: &str, context: &impl Serialize) -> Result<String, StageFault> {
    minijinja::Environment::new()
        .render_str(template, context)
        .map_err(StageFault::internal)
}

/// Outcome of a typed model call.
pub(super) struct ModelCall<T> {
    metadata: Option<LlmCallMetadata>,
    pub outcome: Result<T, StageFailure>,
}

impl<T> ModelCall<T> {
    /// Starts an update carrying this call's id and the new token total.
    pub fn accounting(&self, state: &RunState) -> StageUpdate {
        self.metadata
            .as_ref()
            .map_or_else(StageUpdate::new, |metadata| {
                StageUpdate::new()
                    .with_llm_call(metadata.call_id.clone())
                    .with_total_tokens(
                        state
                            .total_tokens_used()
                            .saturating_add(metadata.total_tokens()),
                    )
            })
    }
}

/// Renders the prompt, invokes the model and validates the output as `T`.
///
/// Collaborator and validation failures land in [`ModelCall::outcome`];
/// only template errors escape as faults.
pub(super) async fn call_model<T: DeserializeOwned>(
    deps: &StageDependencies,
    stage: StageId,
    state: &RunState,
    template: &PromptTemplate,
    context: &Value,
) -> Result<ModelCall<T>, StageFault> {
    let prompt = StructuredPrompt {
        template: template.name.to_owned(),
        system: render(template.system, context)?,
        user: render(template.user, context)?,
        schema: template.schema.to_owned(),
    };
    let response = match deps.model.invoke_structured(&prompt).await {
        Ok(response) => response,
        Err(err) => {
            return Ok(ModelCall {
                metadata: None,
                outcome: Err(StageFailure::ExternalCall(err)),
            });
        }
    };
    record_call(deps, stage, state, &response.metadata);

    let outcome = match response.parsed {
        Some(value) => serde_json::from_value::<T>(value)
            .map_err(|err| StageFailure::OutputValidation(format!("{}: {err}", template.schema))),
        None => Err(StageFailure::OutputValidation(
            response
                .metadata
                .error
                .clone()
                .unwrap_or_else(|| format!("no {} in model response", template.schema)),
        )),
    };
    Ok(ModelCall {
        metadata: Some(response.metadata),
        outcome,
    })
}

fn record_call(deps: &StageDependencies, stage: StageId, state: &RunState, metadata: &LlmCallMetadata) {
    let event = if metadata.parsed_successfully {
        ActivityEvent::info("llm_call_completed")
    } else {
        ActivityEvent::warning("llm_call_completed")
    };
    deps.activity.for_component(stage.as_str()).emit(
        event
            .scoped(&state.activity_scope())
            .with_field("call_id", metadata.call_id.as_str())
            .with_field("model_id", metadata.model_id.as_str())
            .with_field("template", metadata.template.as_str())
            .with_field("input_tokens", metadata.input_tokens)
            .with_field("output_tokens", metadata.output_tokens)
            .with_field("latency_ms", metadata.latency_ms)
            .with_field("parsed_successfully", metadata.parsed_successfully)
            .with_field("error", metadata.error.clone()),
    );
}

/// Truncates `text` to at most `max_chars` characters.
pub(super) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
