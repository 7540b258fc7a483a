//! Branch predicate evaluated after the completeness check.

use crate::run::domain::RunState;

/// Outcome of the post-completeness branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Ask the reporter for clarification.
    Clarify,
    /// Continue into code generation.
    Continue,
}

/// Decides where a run goes after the completeness check.
///
/// A raised stop flag always wins, so upstream failures short-circuit to
/// clarification. Otherwise only an explicit complete verdict continues.
#[must_use]
pub const fn route_after_completeness(state: &RunState) -> RouteDecision {
    if state.should_stop() {
        return RouteDecision::Clarify;
    }
    match state.is_complete() {
        Some(true) => RouteDecision::Continue,
        Some(false) | None => RouteDecision::Clarify,
    }
}
