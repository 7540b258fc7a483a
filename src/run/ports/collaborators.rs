//! External collaborators the pipeline stages call out to.
//!
//! Only the contracts live here. Concrete issue-tracker, documentation,
//! code-host and model clients are adapters.

use crate::run::domain::{FileChange, TicketFields, TicketId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Errors returned by collaborator adapters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The requested resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The service could not be reached or rejected the request.
    #[error("{service} request failed: {message}")]
    Request {
        /// Service name, e.g. `issue tracker`.
        service: &'static str,
        /// Failure detail.
        message: String,
    },
}

impl CollaboratorError {
    /// Creates a request failure for `service`.
    pub fn request(service: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            service,
            message: message.into(),
        }
    }
}

/// Issue tracker access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetches a ticket.
    async fn fetch(&self, ticket_id: &TicketId) -> CollaboratorResult<TicketFields>;

    /// Posts a comment and returns the tracker's comment identifier.
    async fn post_comment(&self, ticket_id: &TicketId, body: &str)
    -> CollaboratorResult<Option<String>>;

    /// Adds a label to a ticket.
    async fn apply_label(&self, ticket_id: &TicketId, label: &str) -> CollaboratorResult<()>;
}

/// Search hit returned by a documentation source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    /// Page identifier.
    pub page_id: String,
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Space or collection key.
    pub space_key: Option<String>,
}

/// Documentation wiki access.
#[async_trait]
pub trait DocumentationSource: Send + Sync {
    /// Searches for pages matching `query`, optionally limited to spaces.
    async fn search(
        &self,
        query: &str,
        space_keys: &[String],
        limit: usize,
    ) -> CollaboratorResult<Vec<PageSummary>>;

    /// Returns the plain-text body of a page.
    async fn page_content(&self, page_id: &str) -> CollaboratorResult<String>;
}

/// Kind of repository tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeEntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

/// Entry in the repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Repository-relative path.
    pub path: String,
    /// Entry kind.
    pub kind: TreeEntryKind,
}

/// Pull request to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    /// Title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Branch carrying the changes.
    pub head_branch: String,
    /// Branch to merge into.
    pub base_branch: String,
    /// Whether to open as a draft.
    pub draft: bool,
    /// Reviewers to request.
    pub reviewers: Vec<String>,
    /// Changes to commit on the head branch.
    pub file_changes: Vec<FileChange>,
}

/// Identity of a newly opened pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPullRequest {
    /// Pull request number.
    pub number: u64,
    /// Pull request URL.
    pub url: String,
}

/// Open or closed state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    /// Still open.
    Open,
    /// Closed, merged or not.
    Closed,
}

/// State of a submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    /// Reviewer approved.
    Approved,
    /// Reviewer requested changes.
    ChangesRequested,
    /// Reviewer only commented.
    Commented,
}

/// Current review status of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestStatus {
    /// Open or closed.
    pub state: PullRequestState,
    /// Whether the pull request was merged.
    pub merged: bool,
    /// Submitted reviews, oldest first.
    pub reviews: Vec<ReviewState>,
}

/// Code hosting access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Lists repository entries on the default branch.
    async fn tree(&self) -> CollaboratorResult<Vec<TreeEntry>>;

    /// Returns a file's content.
    async fn file_content(&self, path: &str) -> CollaboratorResult<String>;

    /// Returns paths whose content matches `query`.
    async fn search_code(&self, query: &str, limit: usize) -> CollaboratorResult<Vec<String>>;

    /// Opens a pull request.
    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> CollaboratorResult<CreatedPullRequest>;

    /// Returns the review status of a pull request.
    async fn pull_request_status(&self, number: u64) -> CollaboratorResult<PullRequestStatus>;
}

/// Prompt for a structured model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredPrompt {
    /// Name of the prompt template.
    pub template: String,
    /// Rendered system message.
    pub system: String,
    /// Rendered user message.
    pub user: String,
    /// Name of the expected output schema.
    pub schema: String,
}

/// Accounting for one model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmCallMetadata {
    /// Unique call identifier.
    pub call_id: String,
    /// Model identifier.
    pub model_id: String,
    /// Template the prompt was rendered from.
    pub template: String,
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
    /// Call latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the response parsed into the expected schema.
    pub parsed_successfully: bool,
    /// Parse or transport failure detail.
    pub error: Option<String>,
}

impl LlmCallMetadata {
    /// Returns prompt plus completion tokens.
    #[must_use]
    pub const fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Structured model response.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredResponse {
    /// Parsed JSON output, absent when parsing failed.
    pub parsed: Option<Value>,
    /// Call accounting.
    pub metadata: LlmCallMetadata,
}

/// Structured-output language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Invokes the model and returns its structured output.
    ///
    /// A response that fails to parse is returned with `parsed: None` rather
    /// than as an error, so its accounting is still recorded.
    async fn invoke_structured(
        &self,
        prompt: &StructuredPrompt,
    ) -> CollaboratorResult<StructuredResponse>;
}
