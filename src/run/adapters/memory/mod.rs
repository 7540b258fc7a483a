//! In-memory adapters for tests and dry runs.

mod collaborators;
mod run;

pub use collaborators::{
    InMemoryCodeHost, InMemoryDocumentationSource, InMemoryTicketSource, ScriptedLanguageModel,
};
pub use run::InMemoryRunRepository;
