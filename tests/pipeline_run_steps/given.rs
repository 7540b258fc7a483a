//! Given steps for pipeline run BDD scenarios.

use super::world::{PipelineWorld, run_async, ticket};
use pipewright::run::domain::TicketFields;
use rstest_bdd_macros::given;
use serde_json::json;

#[given(r#"a ticket "{key}" titled "{title}""#)]
fn ticket_titled(world: &mut PipelineWorld, key: String, title: String) -> eyre::Result<()> {
    let fields = TicketFields::new(title, "Finance asked for this in the quarterly review.")
        .with_acceptance_criteria("The export downloads from the report page.");
    world.tickets = world.tickets.clone().with_ticket(&ticket(&key)?, fields);
    Ok(())
}

#[given(r#"the issue tracker cannot return "{key}""#)]
fn tracker_unavailable(world: &mut PipelineWorld, key: String) -> eyre::Result<()> {
    world.tickets = world.tickets.clone().with_unavailable(&ticket(&key)?);
    Ok(())
}

fn script_model(world: &mut PipelineWorld, decision: &str, score: f64) {
    world.model = world
        .model
        .clone()
        .with_response(
            "completeness",
            json!({
                "decision": decision,
                "completeness_score": score,
                "clarification_questions": ["Which report should change?"]
            }),
        )
        .with_response(
            "repo_scout",
            json!({
                "relevant_files": [
                    { "file_path": "src/billing/report.rs", "relevance_reason": "renders the report" }
                ]
            }),
        )
        .with_response(
            "planner",
            json!({ "summary": "Add an exporter.", "steps": [ { "step_number": 1, "title": "Add exporter" } ] }),
        )
        .with_response(
            "code_proposal",
            json!({
                "summary": "Exporter module.",
                "file_changes": [ { "file_path": "src/billing/export.rs", "change_type": "create" } ]
            }),
        );
}

#[given("the model judges the ticket {decision} with score {score:f64}")]
fn model_judges(world: &mut PipelineWorld, decision: String, score: f64) {
    script_model(world, &decision, score);
    world.model = world.model.clone().with_response(
        "test_suggestion",
        json!({ "test_cases": [ { "test_name": "exports_rows" } ] }),
    );
}

#[given("the model judges the ticket complete but cannot suggest tests")]
fn model_cannot_suggest_tests(world: &mut PipelineWorld) {
    script_model(world, "complete", 0.9);
    world.model = world.model.clone().with_unparsed("test_suggestion");
}

#[given("dry-run mode is enabled")]
fn dry_run_enabled(world: &mut PipelineWorld) {
    world.config.dry_run = true;
}

#[given(r#"the pipeline has already run for "{key}""#)]
fn already_run(world: &mut PipelineWorld, key: String) -> eyre::Result<()> {
    let orchestrator = world.orchestrator()?;
    let state = run_async(orchestrator.run_ticket(ticket(&key)?));
    if state.current_phase().as_str() != "completed" {
        return Err(eyre::eyre!("initial run for {key} did not complete"));
    }
    world.last_state = Some(state);
    Ok(())
}
