//! Shared world state for pipeline run BDD scenarios.

use std::sync::Arc;

use pipewright::audit::{ActivityLogger, adapters::InMemoryActivityLog, ports::ActivitySink};
use pipewright::config::PipelineConfig;
use pipewright::run::{
    adapters::memory::{
        InMemoryCodeHost, InMemoryDocumentationSource, InMemoryRunRepository,
        InMemoryTicketSource, ScriptedLanguageModel,
    },
    domain::{RunState, TicketId},
    pipeline::{Executor, PipelineGraph},
    services::RunOrchestrator,
    stages::{StageDependencies, standard_registry},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Orchestrator type used by the BDD world.
pub type TestOrchestrator = RunOrchestrator<InMemoryRunRepository, DefaultClock>;

/// Scenario world for pipeline run behaviour tests.
pub struct PipelineWorld {
    pub tickets: InMemoryTicketSource,
    pub code_host: InMemoryCodeHost,
    pub model: ScriptedLanguageModel,
    pub repository: Arc<InMemoryRunRepository>,
    pub log: Arc<InMemoryActivityLog>,
    pub config: PipelineConfig,
    pub last_state: Option<RunState>,
    pub dispatched: Vec<RunState>,
}

impl PipelineWorld {
    /// Creates a world with empty collaborators.
    #[must_use]
    pub fn new() -> Self {
        let mut config = PipelineConfig::default();
        config.repository.owner = "acme".to_owned();
        config.repository.name = "ledger".to_owned();
        config.docs.enabled = false;
        Self {
            tickets: InMemoryTicketSource::new(),
            code_host: InMemoryCodeHost::new()
                .with_file("src/billing/report.rs", "pub fn billing_report() {}"),
            model: ScriptedLanguageModel::new(),
            repository: Arc::new(InMemoryRunRepository::new()),
            log: Arc::new(InMemoryActivityLog::new()),
            config,
            last_state: None,
            dispatched: Vec::new(),
        }
    }

    /// Builds an orchestrator over the world's current collaborators.
    pub fn orchestrator(&self) -> eyre::Result<TestOrchestrator> {
        let sink: Arc<dyn ActivitySink> = Arc::clone(&self.log) as Arc<dyn ActivitySink>;
        let activity = ActivityLogger::new("bdd", sink);
        let deps = StageDependencies {
            tickets: Arc::new(self.tickets.clone()),
            docs: Arc::new(InMemoryDocumentationSource::new()),
            code_host: Arc::new(self.code_host.clone()),
            model: Arc::new(self.model.clone()),
            config: Arc::new(self.config.clone()),
            clock: Arc::new(DefaultClock),
            activity: activity.clone(),
        };
        let executor = Executor::new(
            PipelineGraph::standard(),
            standard_registry(&deps),
            activity.clone(),
        )?;
        Ok(RunOrchestrator::new(
            Arc::clone(&self.repository),
            Arc::new(executor),
            Arc::new(DefaultClock),
            activity,
        ))
    }
}

impl Default for PipelineWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> PipelineWorld {
    PipelineWorld::default()
}

/// Parses a ticket key captured from a step.
pub fn ticket(key: &str) -> eyre::Result<TicketId> {
    Ok(TicketId::new(key)?)
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
