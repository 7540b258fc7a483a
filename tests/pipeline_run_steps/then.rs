//! Then steps for pipeline run BDD scenarios.

use super::world::{PipelineWorld, run_async, ticket};
use eyre::eyre;
use pipewright::run::{domain::RunState, ports::RunRepository};
use rstest_bdd_macros::then;

fn last_state(world: &PipelineWorld) -> eyre::Result<&RunState> {
    world
        .last_state
        .as_ref()
        .ok_or_else(|| eyre!("no run recorded in scenario world"))
}

#[then(r#"the run finishes in phase "{phase}""#)]
fn run_finishes_in_phase(world: &PipelineWorld, phase: String) -> eyre::Result<()> {
    let state = last_state(world)?;
    let actual = state.current_phase().as_str();
    if actual != phase {
        return Err(eyre!("expected phase {phase}, found {actual}"));
    }
    if state.completed_at().is_none() {
        return Err(eyre!("expected the terminal stage to stamp completion"));
    }
    Ok(())
}

#[then("{count:usize} pull request is opened")]
fn pull_requests_opened(world: &PipelineWorld, count: usize) -> eyre::Result<()> {
    let opened = world.code_host.opened_pull_requests().len();
    if opened != count {
        return Err(eyre!("expected {count} opened pull requests, found {opened}"));
    }
    Ok(())
}

#[then(r#"a clarification comment is posted on "{key}""#)]
fn clarification_posted(world: &PipelineWorld, key: String) -> eyre::Result<()> {
    let expected = ticket(&key)?;
    let posted = world
        .tickets
        .posted_comments()
        .into_iter()
        .filter(|(ticket_id, _)| ticket_id == &expected)
        .count();
    if posted != 1 {
        return Err(eyre!("expected one clarification comment, found {posted}"));
    }
    Ok(())
}

#[then(r#"the stored run has status "{status}""#)]
fn stored_run_status(world: &PipelineWorld, status: String) -> eyre::Result<()> {
    let state = last_state(world)?;
    let record = run_async(world.repository.find_run(state.run_id()))?
        .ok_or_else(|| eyre!("run {} was not stored", state.run_id()))?;
    if record.status.as_str() != status {
        return Err(eyre!("expected status {status}, found {}", record.status));
    }
    Ok(())
}

#[then(r#"the run records {count:usize} error from "{stage}""#)]
fn run_records_errors(world: &PipelineWorld, count: usize, stage: String) -> eyre::Result<()> {
    let errors = last_state(world)?.errors();
    if errors.len() != count {
        return Err(eyre!("expected {count} errors, found {errors:?}"));
    }
    let prefix = format!("{stage}: ");
    if !errors.iter().all(|error| error.starts_with(&prefix)) {
        return Err(eyre!("expected errors from {stage}, found {errors:?}"));
    }
    Ok(())
}

#[then(r#"only "{key}" is run"#)]
fn only_ticket_run(world: &PipelineWorld, key: String) -> eyre::Result<()> {
    let expected = ticket(&key)?;
    let run: Vec<&str> = world
        .dispatched
        .iter()
        .map(|state| state.ticket_id().as_str())
        .collect();
    if run != [expected.as_str()] {
        return Err(eyre!("expected only {key} to run, found {run:?}"));
    }
    Ok(())
}
