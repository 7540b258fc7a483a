//! Retrieves documentation related to the ticket.

use super::{
    StageDependencies,
    support::{PromptTemplate, call_model, truncate_chars},
};
use crate::run::{
    domain::{DocsContext, RunState, StageUpdate, TicketContext, ToolCallRecord},
    pipeline::{Stage, StageFailure, StageFault, StageId},
    ports::PageSummary,
};
use async_trait::async_trait;
use serde_json::json;

const PAGE_EXCERPT_CHARS: usize = 4000;

const TEMPLATE: PromptTemplate = PromptTemplate {
    name: "docs",
    schema: "docs_context",
    system: "You are a technical writer helping an engineer prepare to implement a ticket. \
Pick out the documentation that matters for the change, summarise what it says, and note \
which pages will need updating once the change ships.",
    user: "Ticket {{ ticket.ticket_id }}: {{ ticket.title }}\n\n\
{{ ticket.description }}\n\n\
## Pages\n{% for page in pages %}### {{ page.title }} ({{ page.page_id }}, {{ page.url }})\n{{ page.content }}\n{% else %}(no pages found)\n{% endfor %}",
};

/// Fills the documentation slot.
///
/// When lookup is disabled in configuration the slot is filled with an
/// empty context and no calls are made.
#[derive(Debug, Clone)]
pub struct FetchDocsStage {
    deps: StageDependencies,
}

impl FetchDocsStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new(deps: StageDependencies) -> Self {
        Self { deps }
    }

    async fn search(&self, queries: &[String]) -> Vec<PageSummary> {
        let settings = &self.deps.config.docs;
        let mut pages: Vec<PageSummary> = Vec::new();
        for query in queries {
            match self
                .deps
                .docs
                .search(query, &settings.space_keys, settings.max_pages)
                .await
            {
                Ok(hits) => {
                    for hit in hits {
                        if !pages.iter().any(|page| page.page_id == hit.page_id) {
                            pages.push(hit);
                        }
                    }
                }
                Err(err) => tracing::warn!(query = %query, error = %err, "documentation search failed"),
            }
        }
        pages.truncate(settings.max_pages);
        pages
    }
}

fn search_queries(ticket: &TicketContext) -> Vec<String> {
    let mut queries = vec![ticket.fields.title.clone()];
    for component in &ticket.fields.components {
        if !queries.contains(component) {
            queries.push(component.clone());
        }
    }
    queries
}

#[async_trait]
impl Stage for FetchDocsStage {
    fn id(&self) -> StageId {
        StageId::FetchDocs
    }

    async fn run(&self, state: &RunState) -> Result<StageUpdate, StageFault> {
        if !self.deps.config.docs.enabled {
            return Ok(StageUpdate::new()
                .with_phase(self.id().phase())
                .with_docs_context(DocsContext::disabled()));
        }
        let Some(ticket) = state.ticket_context() else {
            return Ok(StageFailure::MissingPrecondition("ticket_context").into_update(self.id()));
        };

        let queries = search_queries(ticket);
        let pages = self.search(&queries).await;
        let mut page_context = Vec::with_capacity(pages.len());
        for page in &pages {
            let content = match self.deps.docs.page_content(&page.page_id).await {
                Ok(content) => truncate_chars(&content, PAGE_EXCERPT_CHARS),
                Err(err) => {
                    tracing::debug!(page_id = %page.page_id, error = %err, "page content unavailable");
                    String::new()
                }
            };
            page_context.push(json!({
                "page_id": page.page_id,
                "title": page.title,
                "url": page.url,
                "content": content,
            }));
        }

        let context = json!({ "ticket": ticket, "pages": page_context });
        let call = call_model::<DocsContext>(&self.deps, self.id(), state, &TEMPLATE, &context).await?;
        let update = call.accounting(state).with_tool_call(ToolCallRecord::new(
            self.id().as_str(),
            "docs_search",
            json!({ "queries": queries, "pages": pages.len() }),
        ));
        let mut docs = match call.outcome {
            Ok(docs) => docs,
            Err(failure) => return Ok(update.with_failure(self.id().as_str(), failure)),
        };
        docs.total_pages_searched = u32::try_from(pages.len()).unwrap_or(u32::MAX);
        docs.search_queries = queries;
        Ok(update.with_phase(self.id().phase()).with_docs_context(docs))
    }
}
