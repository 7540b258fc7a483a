//! Coarse run progress indicator.

use super::ParseRunValueError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase a run is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Loading the ticket from the issue tracker.
    #[default]
    FetchingTicket,
    /// Assessing ticket completeness.
    CheckingCompleteness,
    /// Posting a clarification request on the ticket.
    PostingClarification,
    /// Scanning the code repository.
    ScoutingRepo,
    /// Retrieving supporting documentation.
    FetchingDocs,
    /// Producing the implementation plan.
    Planning,
    /// Drafting code changes.
    ProposingCode,
    /// Drafting test cases.
    SuggestingTests,
    /// Opening the pull request.
    ComposingPr,
    /// The run finished without a fatal error.
    Completed,
    /// The run finished after a fatal error.
    Failed,
}

impl RunPhase {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FetchingTicket => "fetching_ticket",
            Self::CheckingCompleteness => "checking_completeness",
            Self::PostingClarification => "posting_clarification",
            Self::ScoutingRepo => "scouting_repo",
            Self::FetchingDocs => "fetching_docs",
            Self::Planning => "planning",
            Self::ProposingCode => "proposing_code",
            Self::SuggestingTests => "suggesting_tests",
            Self::ComposingPr => "composing_pr",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for phases that end a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl TryFrom<&str> for RunPhase {
    type Error = ParseRunValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "fetching_ticket" => Ok(Self::FetchingTicket),
            "checking_completeness" => Ok(Self::CheckingCompleteness),
            "posting_clarification" => Ok(Self::PostingClarification),
            "scouting_repo" => Ok(Self::ScoutingRepo),
            "fetching_docs" => Ok(Self::FetchingDocs),
            "planning" => Ok(Self::Planning),
            "proposing_code" => Ok(Self::ProposingCode),
            "suggesting_tests" => Ok(Self::SuggestingTests),
            "composing_pr" => Ok(Self::ComposingPr),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseRunValueError::new("run phase", other)),
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
