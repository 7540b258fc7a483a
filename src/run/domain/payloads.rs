//! Typed stage outputs stored in the run state slots.
//!
//! Model-produced payloads derive `Deserialize` with lenient defaults so a
//! structured response missing optional keys still validates. Required keys
//! (titles, decisions, summaries) have no default and fail validation when
//! absent.

use super::TicketId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment already present on a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketComment {
    /// Tracker-assigned comment identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Author display name.
    #[serde(default)]
    pub author: Option<String>,
    /// Comment body.
    pub body: String,
}

/// Ticket fields as returned by the issue tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketFields {
    /// Ticket summary line.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Acceptance criteria, when recorded separately.
    pub acceptance_criteria: Option<String>,
    /// Tracker issue type such as `Story` or `Bug`.
    pub issue_type: Option<String>,
    /// Priority name.
    pub priority: Option<String>,
    /// Story point estimate.
    pub story_points: Option<f64>,
    /// Workflow status name.
    pub status: Option<String>,
    /// Reporter display name.
    pub reporter: Option<String>,
    /// Assignee display name.
    pub assignee: Option<String>,
    /// Ticket labels.
    pub labels: Vec<String>,
    /// Component names.
    pub components: Vec<String>,
    /// Keys of linked tickets.
    pub linked_issues: Vec<String>,
    /// Existing comments, oldest first.
    pub comments: Vec<TicketComment>,
}

impl TicketFields {
    /// Creates fields with a title and description.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Sets the acceptance criteria.
    #[must_use]
    pub fn with_acceptance_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.acceptance_criteria = Some(criteria.into());
        self
    }

    /// Sets the component names.
    #[must_use]
    pub fn with_components(mut self, components: Vec<String>) -> Self {
        self.components = components;
        self
    }
}

/// Ticket snapshot captured at the start of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketContext {
    /// Ticket key.
    pub ticket_id: TicketId,
    /// Fields as fetched.
    #[serde(flatten)]
    pub fields: TicketFields,
    /// Fetch time.
    pub fetched_at: DateTime<Utc>,
}

/// Outcome of the completeness assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessDecision {
    /// The ticket can be implemented as written.
    Complete,
    /// The ticket needs clarification first.
    Incomplete,
}

/// A field the assessment found missing or inadequate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingField {
    /// Name of the missing field.
    pub field_name: String,
    /// `critical`, `major` or `minor`.
    #[serde(default = "default_severity")]
    pub severity: String,
    /// What is missing and why it matters.
    #[serde(default)]
    pub description: String,
}

fn default_severity() -> String {
    "major".to_owned()
}

/// Completeness assessment of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessResult {
    /// Model verdict.
    pub decision: CompletenessDecision,
    /// Score in `[0, 1]`.
    pub completeness_score: f64,
    /// Missing or inadequate fields.
    #[serde(default)]
    pub missing_fields: Vec<MissingField>,
    /// Questions to put to the reporter.
    #[serde(default)]
    pub clarification_questions: Vec<String>,
    /// Assumptions the model made while scoring.
    #[serde(default)]
    pub assumptions_summary: Option<String>,
    /// Whether a clarification comment was posted.
    #[serde(default)]
    pub comment_posted: bool,
    /// Identifier of the posted clarification comment.
    #[serde(default)]
    pub comment_id: Option<String>,
}

impl CompletenessResult {
    /// Returns `true` when the verdict is complete and the score clears
    /// `threshold`.
    #[must_use]
    pub fn passes(&self, threshold: f64) -> bool {
        self.decision == CompletenessDecision::Complete && self.completeness_score >= threshold
    }
}

/// Per-file relevance assessment produced while scouting the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    /// Repository-relative path.
    pub file_path: String,
    /// Detected language.
    #[serde(default)]
    pub language: Option<String>,
    /// Relevance in `[0, 1]`.
    #[serde(default)]
    pub relevance_score: f64,
    /// Why the file matters for the ticket.
    #[serde(default)]
    pub relevance_reason: String,
    /// Function names found in the file.
    #[serde(default)]
    pub functions_detected: Vec<String>,
    /// Type or class names found in the file.
    #[serde(default)]
    pub types_detected: Vec<String>,
}

/// Repository knowledge relevant to the ticket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoContext {
    /// Repository owner.
    pub repo_owner: String,
    /// Repository name.
    pub repo_name: String,
    /// Default branch.
    pub default_branch: String,
    /// Dominant language.
    pub primary_language: Option<String>,
    /// Short listing of top-level entries.
    pub directory_summary: String,
    /// Files judged relevant.
    pub relevant_files: Vec<FileAnalysis>,
    /// Existing test files.
    pub existing_test_files: Vec<String>,
    /// Dependency manifest observations.
    pub dependency_hints: Vec<String>,
    /// Observed code conventions.
    pub code_style_hints: Option<String>,
    /// Modules the ticket will touch.
    pub impacted_modules: Vec<String>,
}

/// Documentation page judged relevant to the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocPage {
    /// Source page identifier.
    pub page_id: String,
    /// Page title.
    pub title: String,
    /// Page URL.
    #[serde(default)]
    pub url: String,
    /// Space or collection key.
    #[serde(default)]
    pub space_key: Option<String>,
    /// Relevant excerpt.
    #[serde(default)]
    pub excerpt: String,
    /// Why the page matters for the ticket.
    #[serde(default)]
    pub relevance_reason: String,
}

/// Documentation context gathered for the ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsContext {
    /// Relevant pages.
    pub pages: Vec<DocPage>,
    /// Number of distinct pages examined.
    pub total_pages_searched: u32,
    /// Search queries issued.
    pub search_queries: Vec<String>,
    /// Summary of the documentation findings.
    pub summary: String,
    /// Documentation that should change alongside the code.
    pub doc_update_suggestions: Vec<String>,
}

impl DocsContext {
    /// Context recorded when documentation lookup is switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            summary: "Documentation lookup disabled; no documentation context retrieved."
                .to_owned(),
            ..Self::default()
        }
    }
}

/// Estimated risk of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Localised change.
    Low,
    /// Moderate blast radius.
    #[default]
    Medium,
    /// Wide impact or hard to roll back.
    High,
}

/// One ordered implementation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// One-based position.
    pub step_number: u32,
    /// Short title.
    pub title: String,
    /// What to do.
    #[serde(default)]
    pub description: String,
    /// Files the step touches.
    #[serde(default)]
    pub affected_files: Vec<String>,
    /// `low`, `medium` or `high`.
    #[serde(default)]
    pub estimated_complexity: Option<String>,
}

/// Implementation plan for the ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationPlan {
    /// One-paragraph summary.
    pub summary: String,
    /// Components impacted.
    #[serde(default)]
    pub impacted_components: Vec<String>,
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    /// Overall risk.
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Reasoning behind the risk level.
    #[serde(default)]
    pub risk_rationale: String,
    /// Whether public interfaces change incompatibly.
    #[serde(default)]
    pub breaking_changes: bool,
    /// Whether schema migrations are needed.
    #[serde(default)]
    pub database_migrations_required: bool,
    /// Confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence_score: f64,
    /// Assumptions behind the plan.
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// Kind of change applied to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// New file.
    Create,
    /// Edited file.
    Modify,
    /// Removed file.
    Delete,
    /// Moved file.
    Rename,
}

/// Proposed change to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Repository-relative path.
    pub file_path: String,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Unified diff or full file content.
    #[serde(default)]
    pub proposed_content: String,
    /// Whether `proposed_content` is a unified diff.
    #[serde(default = "default_true")]
    pub is_diff_format: bool,
    /// Why the change is needed.
    #[serde(default)]
    pub rationale: String,
}

const fn default_true() -> bool {
    true
}

/// Proposed code changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeProposal {
    /// Summary of the change set.
    pub summary: String,
    /// Per-file changes.
    #[serde(default)]
    pub file_changes: Vec<FileChange>,
    /// New dependencies introduced.
    #[serde(default)]
    pub new_dependencies: Vec<String>,
    /// Known limitations.
    #[serde(default)]
    pub caveats: Vec<String>,
    /// Confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence_score: f64,
}

/// Level at which a test exercises the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Single unit in isolation.
    #[default]
    Unit,
    /// Several units together.
    Integration,
    /// Interface contract.
    Contract,
    /// Whole system.
    EndToEnd,
}

/// One suggested test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Proposed test name.
    pub test_name: String,
    /// Test level.
    #[serde(default)]
    pub test_kind: TestKind,
    /// Function or module under test.
    #[serde(default)]
    pub target: String,
    /// What the test checks.
    #[serde(default)]
    pub description: String,
    /// Whether the case covers an edge condition.
    #[serde(default)]
    pub edge_case: bool,
}

/// Suggested tests for the proposal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestSuggestions {
    /// Test framework in use.
    pub framework: Option<String>,
    /// Where new tests should live.
    pub suggested_test_file_paths: Vec<String>,
    /// Suggested cases.
    pub test_cases: Vec<TestCase>,
    /// Behaviours the tests should cover.
    pub coverage_targets: Vec<String>,
    /// Confidence in `[0, 1]`.
    pub confidence_score: f64,
}

/// Result of attempting to open a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrCompositionStatus {
    /// The pull request was opened.
    Created,
    /// Opening the pull request failed.
    Failed,
    /// Opening was skipped, e.g. in dry-run mode.
    Skipped,
}

/// Composed pull request and the outcome of opening it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrComposition {
    /// Outcome of the attempt.
    pub status: PrCompositionStatus,
    /// Pull request URL when created.
    pub pr_url: Option<String>,
    /// Pull request number when created.
    pub pr_number: Option<u64>,
    /// Head branch.
    pub branch_name: String,
    /// Base branch.
    pub base_branch: String,
    /// Title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Whether the pull request is a draft.
    pub draft: bool,
    /// Reviewers requested.
    pub reviewers_requested: Vec<String>,
}
