//! Scans the code repository for files relevant to the ticket.

use super::{
    StageDependencies,
    support::{PromptTemplate, call_model, truncate_chars},
};
use crate::run::{
    domain::{RepoContext, RunState, StageUpdate, TicketContext, ToolCallRecord},
    pipeline::{Stage, StageFailure, StageFault, StageId},
    ports::{TreeEntry, TreeEntryKind},
};
use async_trait::async_trait;
use serde_json::json;

const MANIFEST_NAMES: [&str; 7] = [
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
];
const MANIFEST_EXCERPT_CHARS: usize = 3000;
const FILE_EXCERPT_CHARS: usize = 2000;
const SEARCH_TERMS: usize = 3;

const TEMPLATE: PromptTemplate = PromptTemplate {
    name: "repo_scout",
    schema: "repo_context",
    system: "You are a senior engineer orienting yourself in an unfamiliar repository. \
From the listing, manifests and file excerpts, identify the files and modules a ticket \
will touch, the dominant language, existing tests, and the conventions new code should follow.",
    user: "Ticket {{ ticket.ticket_id }}: {{ ticket.title }}\n\n\
{{ ticket.description }}\n\n\
## Top-level entries\n{{ directory_summary }}\n\n\
## Dependency manifests\n{% for manifest in manifests %}### {{ manifest.path }}\n{{ manifest.content }}\n{% else %}(none found)\n{% endfor %}\n\
## Candidate files\n{% for file in files %}### {{ file.path }}\n{{ file.content }}\n{% else %}(no matches)\n{% endfor %}\n\
Rate each candidate's relevance from 0.0 to 1.0 and explain why it matters.",
};

/// Fills the repository slot.
#[derive(Debug, Clone)]
pub struct RepoScoutStage {
    deps: StageDependencies,
}

impl RepoScoutStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }

    async fn candidate_paths(&self, ticket: &TicketContext, tree: &[TreeEntry]) -> Vec<String> {
        let limit = self.deps.config.repository.max_scout_files;
        let mut paths: Vec<String> = Vec::new();
        for term in search_terms(&ticket.fields.title) {
            match self.deps.code_host.search_code(&term, limit).await {
                Ok(hits) => {
                    for hit in hits {
                        if !paths.contains(&hit) {
                            paths.push(hit);
                        }
                    }
                }
                Err(err) => tracing::warn!(term = %term, error = %err, "code search failed"),
            }
        }
        if paths.is_empty() {
            paths = tree
                .iter()
                .filter(|entry| entry.kind == TreeEntryKind::File)
                .map(|entry| entry.path.clone())
                .collect();
        }
        paths.truncate(limit);
        paths
    }

    async fn excerpts(&self, paths: &[String], max_chars: usize) -> Vec<serde_json::Value> {
        let mut excerpts = Vec::with_capacity(paths.len());
        for path in paths {
            match self.deps.code_host.file_content(path).await {
                Ok(content) => excerpts.push(json!({
                    "path": path,
                    "content": truncate_chars(&content, max_chars),
                })),
                Err(err) => tracing::debug!(path = %path, error = %err, "skipping unreadable file"),
            }
        }
        excerpts
    }
}

fn search_terms(title: &str) -> Vec<String> {
    title
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| word.chars().count() > 3)
        .map(str::to_lowercase)
        .take(SEARCH_TERMS)
        .collect()
}

fn directory_summary(tree: &[TreeEntry]) -> String {
    let mut top_level: Vec<String> = Vec::new();
    for entry in tree {
        let first = entry.path.split('/').next().unwrap_or_default();
        let name = if entry.path.contains('/') || entry.kind == TreeEntryKind::Directory {
            format!("{first}/")
        } else {
            first.to_owned()
        };
        if !top_level.contains(&name) {
            top_level.push(name);
        }
    }
    top_level.join(", ")
}

#[async_trait]
impl Stage for RepoScoutStage {
    fn id(&self) -> StageId {
        StageId::RepoScout
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        let Some(ticket) = state.ticket_context() else {
            return Ok(StageFailure::MissingPrecondition("ticket_context").into_update(self.id()));
        };
        let tree = match self.deps.code_host.tree().await {
            Ok(tree) => tree,
            Err(err) => return Ok(StageFailure::ExternalCall(err).into_update(self.id())),
        };

        let manifest_paths: Vec<String> = tree
            .iter()
            .filter(|entry| {
                entry.kind == TreeEntryKind::File
                    && MANIFEST_NAMES
                        .iter()
                        .any(|name| entry.path.rsplit('/').next() == Some(*name))
            })
            .map(|entry| entry.path.clone())
            .collect();
        let candidates = self.candidate_paths(ticket, &tree).await;
        let summary = directory_summary(&tree);
        let context = json!({
            "ticket": ticket,
            "directory_summary": summary,
            "manifests": self.excerpts(&manifest_paths, MANIFEST_EXCERPT_CHARS).await,
            "files": self.excerpts(&candidates, FILE_EXCERPT_CHARS).await,
        });

        let call = call_model::<RepoContext>(&self.deps, self.id(), state, &TEMPLATE, &context).await?;
        let update = call.accounting(state).with_tool_call(ToolCallRecord::new(
            self.id().as_str(),
            "code_host_scan",
            json!({
                "tree_entries": tree.len(),
                "manifests": manifest_paths,
                "candidates": candidates,
            }),
        ));
        let mut repo = match call.outcome {
            Ok(repo) => repo,
            Err(failure) => return Ok(update.with_failure(self.id().as_str(), failure)),
        };
        let settings = &self.deps.config.repository;
        repo.repo_owner.clone_from(&settings.owner);
        repo.repo_name.clone_from(&settings.name);
        if repo.default_branch.is_empty() {
            repo.default_branch.clone_from(&settings.base_branch);
        }
        if repo.directory_summary.is_empty() {
            repo.directory_summary = summary;
        }
        Ok(update.with_phase(self.id().phase()).with_repo_context(repo))
    }
}
