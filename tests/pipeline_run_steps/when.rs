//! When steps for pipeline run BDD scenarios.

use super::world::{PipelineWorld, run_async, ticket};
use rstest_bdd_macros::when;

#[when(r#"the pipeline runs for "{key}""#)]
fn pipeline_runs(world: &mut PipelineWorld, key: String) -> eyre::Result<()> {
    let orchestrator = world.orchestrator()?;
    world.last_state = Some(run_async(orchestrator.run_ticket(ticket(&key)?)));
    Ok(())
}

#[when(r#"tickets "{first}" and "{second}" are dispatched"#)]
fn tickets_dispatched(world: &mut PipelineWorld, first: String, second: String) -> eyre::Result<()> {
    let orchestrator = world.orchestrator()?;
    let keys = [ticket(&first)?, ticket(&second)?];
    world.dispatched = run_async(orchestrator.dispatch(keys));
    Ok(())
}
