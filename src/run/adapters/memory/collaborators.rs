//! In-memory collaborators.
//!
//! These stand in for the issue tracker, documentation wiki, code host and
//! model in tests and local dry runs. Each records the calls made against it.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

use crate::run::{
    domain::{TicketComment, TicketFields, TicketId},
    ports::{
        CodeHost, CollaboratorError, CollaboratorResult, CreatedPullRequest, DocumentationSource,
        LanguageModel, LlmCallMetadata, NewPullRequest, PageSummary, PullRequestState,
        PullRequestStatus, StructuredPrompt, StructuredResponse, TicketSource, TreeEntry,
        TreeEntryKind,
    },
};

fn poisoned<T>(service: &'static str) -> impl FnOnce(PoisonError<T>) -> CollaboratorError {
    move |err| CollaboratorError::request(service, err.to_string())
}

const TRACKER: &str = "issue tracker";
const WIKI: &str = "documentation";
const CODE_HOST: &str = "code host";
const MODEL: &str = "language model";

#[derive(Debug, Default)]
struct TrackerState {
    tickets: HashMap<TicketId, TicketFields>,
    unavailable: HashSet<TicketId>,
    comments: Vec<(TicketId, String)>,
    labels: Vec<(TicketId, String)>,
    fail_writes: bool,
}

/// In-memory issue tracker.
///
/// Posted comments are appended to the stored ticket so later fetches see
/// them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketSource {
    state: Arc<RwLock<TrackerState>>,
}

impl InMemoryTicketSource {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a ticket.
    #[must_use]
    pub fn with_ticket(self, ticket_id: &TicketId, fields: TicketFields) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.tickets.insert(ticket_id.clone(), fields);
        }
        self
    }

    /// Makes fetches of `ticket_id` fail as if the tracker were down.
    #[must_use]
    pub fn with_unavailable(self, ticket_id: &TicketId) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.unavailable.insert(ticket_id.clone());
        }
        self
    }

    /// Makes comment and label writes fail.
    #[must_use]
    pub fn with_failing_writes(self) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.fail_writes = true;
        }
        self
    }

    /// Returns posted comments in order.
    #[must_use]
    pub fn posted_comments(&self) -> Vec<(TicketId, String)> {
        self.state
            .read()
            .map(|state| state.comments.clone())
            .unwrap_or_default()
    }

    /// Returns applied labels in order.
    #[must_use]
    pub fn applied_labels(&self) -> Vec<(TicketId, String)> {
        self.state
            .read()
            .map(|state| state.labels.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TicketSource for InMemoryTicketSource {
    async fn fetch(&self, ticket_id: &TicketId) -> CollaboratorResult<TicketFields> {
        let state = self.state.read().map_err(poisoned(TRACKER))?;
        if state.unavailable.contains(ticket_id) {
            return Err(CollaboratorError::request(TRACKER, "service unavailable"));
        }
        state
            .tickets
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("ticket {ticket_id}")))
    }

    async fn post_comment(
        &self,
        ticket_id: &TicketId,
        body: &str,
    ) -> CollaboratorResult<Option<String>> {
        let mut state = self.state.write().map_err(poisoned(TRACKER))?;
        if state.fail_writes {
            return Err(CollaboratorError::request(TRACKER, "comment rejected"));
        }
        state.comments.push((ticket_id.clone(), body.to_owned()));
        let comment_id = format!("comment-{}", state.comments.len());
        if let Some(ticket) = state.tickets.get_mut(ticket_id) {
            ticket.comments.push(TicketComment {
                id: Some(comment_id.clone()),
                author: Some("pipewright".to_owned()),
                body: body.to_owned(),
            });
        }
        Ok(Some(comment_id))
    }

    async fn apply_label(&self, ticket_id: &TicketId, label: &str) -> CollaboratorResult<()> {
        let mut state = self.state.write().map_err(poisoned(TRACKER))?;
        if state.fail_writes {
            return Err(CollaboratorError::request(TRACKER, "label rejected"));
        }
        state.labels.push((ticket_id.clone(), label.to_owned()));
        if let Some(ticket) = state.tickets.get_mut(ticket_id) {
            if !ticket.labels.iter().any(|existing| existing == label) {
                ticket.labels.push(label.to_owned());
            }
        }
        Ok(())
    }
}

/// In-memory documentation source.
///
/// A page matches a query when any query word of four or more characters
/// appears in its title or body.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentationSource {
    pages: Arc<RwLock<Vec<(PageSummary, String)>>>,
}

impl InMemoryDocumentationSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a page.
    #[must_use]
    pub fn with_page(self, page: PageSummary, content: impl Into<String>) -> Self {
        if let Ok(mut pages) = self.pages.write() {
            pages.push((page, content.into()));
        }
        self
    }
}

fn query_words(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|word| word.chars().count() >= 4)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl DocumentationSource for InMemoryDocumentationSource {
    async fn search(
        &self,
        query: &str,
        space_keys: &[String],
        limit: usize,
    ) -> CollaboratorResult<Vec<PageSummary>> {
        let pages = self.pages.read().map_err(poisoned(WIKI))?;
        let words = query_words(query);
        Ok(pages
            .iter()
            .filter(|(page, _)| {
                space_keys.is_empty()
                    || page
                        .space_key
                        .as_ref()
                        .is_some_and(|key| space_keys.contains(key))
            })
            .filter(|(page, content)| {
                let haystack = format!("{} {}", page.title, content).to_lowercase();
                words.iter().any(|word| haystack.contains(word.as_str()))
            })
            .map(|(page, _)| page.clone())
            .take(limit)
            .collect())
    }

    async fn page_content(&self, page_id: &str) -> CollaboratorResult<String> {
        let pages = self.pages.read().map_err(poisoned(WIKI))?;
        pages
            .iter()
            .find(|(page, _)| page.page_id == page_id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("page {page_id}")))
    }
}

#[derive(Debug, Default)]
struct CodeHostState {
    files: Vec<(String, String)>,
    pull_requests: Vec<NewPullRequest>,
    statuses: HashMap<u64, PullRequestStatus>,
    fail_pull_requests: bool,
}

/// In-memory code host.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCodeHost {
    state: Arc<RwLock<CodeHostState>>,
}

impl InMemoryCodeHost {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a file.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.files.push((path.into(), content.into()));
        }
        self
    }

    /// Makes pull request creation fail.
    #[must_use]
    pub fn with_failing_pull_requests(self) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.fail_pull_requests = true;
        }
        self
    }

    /// Overrides the review status of a pull request.
    pub fn set_status(&self, number: u64, status: PullRequestStatus) {
        if let Ok(mut state) = self.state.write() {
            state.statuses.insert(number, status);
        }
    }

    /// Returns opened pull requests in order.
    #[must_use]
    pub fn opened_pull_requests(&self) -> Vec<NewPullRequest> {
        self.state
            .read()
            .map(|state| state.pull_requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CodeHost for InMemoryCodeHost {
    async fn tree(&self) -> CollaboratorResult<Vec<TreeEntry>> {
        let state = self.state.read().map_err(poisoned(CODE_HOST))?;
        let mut entries: Vec<TreeEntry> = Vec::new();
        for (path, _) in &state.files {
            let mut prefix = String::new();
            let mut parts = path.split('/').peekable();
            while let Some(part) = parts.next() {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(part);
                let kind = if parts.peek().is_some() {
                    TreeEntryKind::Directory
                } else {
                    TreeEntryKind::File
                };
                if !entries.iter().any(|entry| entry.path == prefix) {
                    entries.push(TreeEntry {
                        path: prefix.clone(),
                        kind,
                    });
                }
            }
        }
        Ok(entries)
    }

    async fn file_content(&self, path: &str) -> CollaboratorResult<String> {
        let state = self.state.read().map_err(poisoned(CODE_HOST))?;
        state
            .files
            .iter()
            .find(|(stored, _)| stored == path)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("file {path}")))
    }

    async fn search_code(&self, query: &str, limit: usize) -> CollaboratorResult<Vec<String>> {
        let state = self.state.read().map_err(poisoned(CODE_HOST))?;
        let needle = query.to_lowercase();
        Ok(state
            .files
            .iter()
            .filter(|(path, content)| {
                path.to_lowercase().contains(&needle) || content.to_lowercase().contains(&needle)
            })
            .map(|(path, _)| path.clone())
            .take(limit)
            .collect())
    }

    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> CollaboratorResult<CreatedPullRequest> {
        let mut state = self.state.write().map_err(poisoned(CODE_HOST))?;
        if state.fail_pull_requests {
            return Err(CollaboratorError::request(CODE_HOST, "pull request rejected"));
        }
        state.pull_requests.push(request.clone());
        let number = u64::try_from(state.pull_requests.len()).unwrap_or(u64::MAX);
        state.statuses.insert(
            number,
            PullRequestStatus {
                state: PullRequestState::Open,
                merged: false,
                reviews: Vec::new(),
            },
        );
        Ok(CreatedPullRequest {
            number,
            url: format!("https://code.example.test/pulls/{number}"),
        })
    }

    async fn pull_request_status(&self, number: u64) -> CollaboratorResult<PullRequestStatus> {
        let state = self.state.read().map_err(poisoned(CODE_HOST))?;
        state
            .statuses
            .get(&number)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("pull request #{number}")))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: HashMap<String, VecDeque<Option<Value>>>,
    prompts: Vec<StructuredPrompt>,
}

/// Language model that replays scripted responses per template.
///
/// Responses queued for a template are returned in order; the last one is
/// repeated once the queue drains. A template with no script yields an
/// unparsed response.
#[derive(Debug, Clone)]
pub struct ScriptedLanguageModel {
    state: Arc<RwLock<ScriptState>>,
    model_id: String,
    tokens_per_call: (u64, u64),
}

impl Default for ScriptedLanguageModel {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            model_id: "scripted".to_owned(),
            tokens_per_call: (120, 80),
        }
    }
}

impl ScriptedLanguageModel {
    /// Creates a model with no scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a parsed response for `template`.
    #[must_use]
    pub fn with_response(self, template: &str, response: Value) -> Self {
        self.push(template, Some(response));
        self
    }

    /// Queues an unparseable response for `template`.
    #[must_use]
    pub fn with_unparsed(self, template: &str) -> Self {
        self.push(template, None);
        self
    }

    /// Sets the prompt and completion tokens reported per call.
    #[must_use]
    pub const fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_per_call = (input, output);
        self
    }

    /// Returns the prompts received, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<StructuredPrompt> {
        self.state
            .read()
            .map(|state| state.prompts.clone())
            .unwrap_or_default()
    }

    fn push(&self, template: &str, response: Option<Value>) {
        if let Ok(mut state) = self.state.write() {
            state
                .responses
                .entry(template.to_owned())
                .or_default()
                .push_back(response);
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn invoke_structured(
        &self,
        prompt: &StructuredPrompt,
    ) -> CollaboratorResult<StructuredResponse> {
        let mut state = self.state.write().map_err(poisoned(MODEL))?;
        state.prompts.push(prompt.clone());
        let parsed = match state.responses.get_mut(&prompt.template) {
            Some(queue) if queue.len() > 1 => queue.pop_front().flatten(),
            Some(queue) => queue.front().cloned().flatten(),
            None => None,
        };
        let (input_tokens, output_tokens) = self.tokens_per_call;
        let error = parsed
            .is_none()
            .then(|| format!("no parseable {} in response", prompt.schema));
        Ok(StructuredResponse {
            metadata: LlmCallMetadata {
                call_id: Uuid::new_v4().to_string(),
                model_id: self.model_id.clone(),
                template: prompt.template.clone(),
                input_tokens,
                output_tokens,
                latency_ms: 0,
                parsed_successfully: parsed.is_some(),
                error,
            },
            parsed,
        })
    }
}
