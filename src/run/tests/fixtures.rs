//! Shared builders for run tests.

use std::sync::Arc;

use crate::audit::{ActivityLogger, adapters::InMemoryActivityLog, ports::ActivitySink};
use crate::config::PipelineConfig;
use crate::run::{
    adapters::memory::{
        InMemoryCodeHost, InMemoryDocumentationSource, InMemoryTicketSource,
        ScriptedLanguageModel,
    },
    domain::{
        PrComposition, PrCompositionStatus, RunId, RunState, StageUpdate, TicketFields, TicketId,
    },
    pipeline::{Executor, PipelineGraph},
    ports::PageSummary,
    stages::{StageDependencies, standard_registry},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use mockable::DefaultClock;
use serde_json::{Value, json};

pub(super) const TICKET: &str = "PROJ-7";

pub(super) fn ticket_id() -> TicketId {
    TicketId::new(TICKET).expect("valid ticket id")
}

pub(super) fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::minutes(minute)
}

pub(super) fn new_state() -> RunState {
    RunState::new(RunId::new(), ticket_id(), at(0))
}

pub(super) fn billing_ticket() -> TicketFields {
    TicketFields::new(
        "Add CSV export to the billing report",
        "Finance needs the monthly billing report as a CSV download.",
    )
    .with_acceptance_criteria("A download button produces a CSV with one row per invoice.")
    .with_components(vec!["billing".to_owned()])
}

pub(super) fn completeness_response(decision: &str, score: f64) -> Value {
    json!({
        "decision": decision,
        "completeness_score": score,
        "missing_fields": [
            { "field_name": "acceptance_criteria", "severity": "critical", "description": "No testable outcome" }
        ],
        "clarification_questions": ["Which columns should the export contain?"],
        "assumptions_summary": "Assumed the export covers a single month."
    })
}

/// Model responses for a full pass through the pipeline, keyed by template.
pub(super) fn pipeline_responses(decision: &str, score: f64) -> Vec<(&'static str, Value)> {
    vec![
        ("completeness", completeness_response(decision, score)),
        (
            "repo_scout",
            json!({
                "primary_language": "rust",
                "relevant_files": [
                    { "file_path": "src/billing/report.rs", "relevance_score": 0.9, "relevance_reason": "renders the report" }
                ],
                "existing_test_files": ["tests/report.rs"]
            }),
        ),
        (
            "docs",
            json!({ "summary": "The billing guide describes report columns." }),
        ),
        (
            "planner",
            json!({
                "summary": "Add a CSV renderer next to the HTML report.",
                "steps": [
                    { "step_number": 1, "title": "Add CSV renderer", "affected_files": ["src/billing/csv.rs"] },
                    { "step_number": 2, "title": "Wire download route" }
                ],
                "risk_level": "low"
            }),
        ),
        (
            "code_proposal",
            json!({
                "summary": "CSV renderer and route.",
                "file_changes": [
                    { "file_path": "src/billing/csv.rs", "change_type": "create", "proposed_content": "pub fn render() {}", "is_diff_format": false }
                ]
            }),
        ),
        (
            "test_suggestion",
            json!({
                "framework": "rstest",
                "test_cases": [ { "test_name": "renders_one_row_per_invoice", "test_kind": "unit" } ]
            }),
        ),
    ]
}

/// Model scripted with `responses`.
pub(super) fn model_from(responses: Vec<(&'static str, Value)>) -> ScriptedLanguageModel {
    responses
        .into_iter()
        .fold(ScriptedLanguageModel::new(), |model, (template, response)| {
            model.with_response(template, response)
        })
}

/// Model scripted for a full pass through the pipeline.
pub(super) fn scripted_model(decision: &str, score: f64) -> ScriptedLanguageModel {
    model_from(pipeline_responses(decision, score))
}

/// In-memory collaborators wired into stage dependencies.
pub(super) struct Harness {
    pub tickets: InMemoryTicketSource,
    pub code_host: InMemoryCodeHost,
    pub model: ScriptedLanguageModel,
    pub log: Arc<InMemoryActivityLog>,
    pub config: PipelineConfig,
}

impl Harness {
    pub fn new(model: ScriptedLanguageModel) -> Self {
        let mut config = PipelineConfig::default();
        config.repository.owner = "acme".to_owned();
        config.repository.name = "ledger".to_owned();
        Self {
            tickets: InMemoryTicketSource::new().with_ticket(&ticket_id(), billing_ticket()),
            code_host: InMemoryCodeHost::new()
                .with_file("Cargo.toml", "[package]\nname = \"ledger\"")
                .with_file("src/billing/report.rs", "pub fn billing_report() {}"),
            model,
            log: Arc::new(InMemoryActivityLog::new()),
            config,
        }
    }

    pub fn activity(&self) -> ActivityLogger {
        let sink: Arc<dyn ActivitySink> = Arc::clone(&self.log) as Arc<dyn ActivitySink>;
        ActivityLogger::new("test", sink)
    }

    pub fn deps(&self) -> StageDependencies {
        let docs = InMemoryDocumentationSource::new().with_page(
            PageSummary {
                page_id: "42".to_owned(),
                title: "Billing report guide".to_owned(),
                url: "https://docs.example.test/42".to_owned(),
                space_key: Some("FIN".to_owned()),
            },
            "The billing report lists invoices by month.",
        );
        StageDependencies {
            tickets: Arc::new(self.tickets.clone()),
            docs: Arc::new(docs),
            code_host: Arc::new(self.code_host.clone()),
            model: Arc::new(self.model.clone()),
            config: Arc::new(self.config.clone()),
            clock: Arc::new(DefaultClock),
            activity: self.activity(),
        }
    }

    pub fn executor(&self) -> Executor {
        Executor::new(
            PipelineGraph::standard(),
            standard_registry(&self.deps()),
            self.activity(),
        )
        .expect("standard registry covers the graph")
    }
}

pub(super) fn created_pr(number: u64) -> PrComposition {
    PrComposition {
        status: PrCompositionStatus::Created,
        pr_url: Some(format!("https://code.example.test/pulls/{number}")),
        pr_number: Some(number),
        branch_name: format!("pipewright/proj-{number}"),
        base_branch: "main".to_owned(),
        title: "Proposal".to_owned(),
        body: String::new(),
        draft: true,
        reviewers_requested: Vec::new(),
    }
}

/// State of a finished run that opened pull request `number`.
pub(super) fn state_with_pr(started_at: DateTime<Utc>, number: u64) -> RunState {
    let mut state = RunState::new(RunId::new(), ticket_id(), started_at);
    state.apply(
        StageUpdate::new()
            .with_completeness_verdict(true)
            .with_pr_result(created_pr(number))
            .with_completed_at(started_at + Duration::seconds(30)),
    );
    state
}
