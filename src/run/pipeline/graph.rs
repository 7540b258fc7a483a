//! Static pipeline topology.

use super::{RouteDecision, StageId, route_after_completeness};
use crate::run::domain::RunState;

/// Conditional branch point in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchPoint {
    /// Decides between clarification and code generation.
    AfterCompleteness,
}

impl BranchPoint {
    /// Returns the successor for the given state.
    #[must_use]
    pub fn resolve(self, state: &RunState) -> StageId {
        let branch = self.table();
        match (branch.predicate)(state) {
            RouteDecision::Clarify => branch.on_clarify,
            RouteDecision::Continue => branch.on_continue,
        }
    }

    /// Returns every stage this branch can lead to.
    #[must_use]
    pub fn targets(self) -> [StageId; 2] {
        let branch = self.table();
        [branch.on_clarify, branch.on_continue]
    }

    fn table(self) -> &'static Branch {
        match self {
            Self::AfterCompleteness => &AFTER_COMPLETENESS,
        }
    }
}

struct Branch {
    predicate: fn(&RunState) -> RouteDecision,
    on_clarify: StageId,
    on_continue: StageId,
}

static AFTER_COMPLETENESS: Branch = Branch {
    predicate: route_after_completeness,
    on_clarify: StageId::PostClarification,
    on_continue: StageId::RepoScout,
};

/// Outgoing edge of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Always proceeds to the given stage.
    Fixed(StageId),
    /// Proceeds according to a branch predicate.
    Branch(BranchPoint),
}

const STANDARD_EDGES: [(StageId, Edge); 9] = [
    (StageId::FetchTicket, Edge::Fixed(StageId::CompletenessCheck)),
    (
        StageId::CompletenessCheck,
        Edge::Branch(BranchPoint::AfterCompleteness),
    ),
    (StageId::PostClarification, Edge::Fixed(StageId::Finish)),
    (StageId::RepoScout, Edge::Fixed(StageId::FetchDocs)),
    (StageId::FetchDocs, Edge::Fixed(StageId::Planner)),
    (StageId::Planner, Edge::Fixed(StageId::CodeProposal)),
    (StageId::CodeProposal, Edge::Fixed(StageId::TestSuggestion)),
    (StageId::TestSuggestion, Edge::Fixed(StageId::PrComposer)),
    (StageId::PrComposer, Edge::Fixed(StageId::Finish)),
];

/// Adjacency table from each stage to its successor.
///
/// The terminal stage has no outgoing edge.
#[derive(Debug, Clone, Copy)]
pub struct PipelineGraph {
    entry: StageId,
    terminal: StageId,
    edges: &'static [(StageId, Edge)],
}

impl PipelineGraph {
    /// Returns the ticket-to-pull-request pipeline.
    ///
    /// ```text
    /// fetch_ticket -> completeness_check -+-> post_clarification ----------------------------------------------------+-> finish
    ///                                     +-> repo_scout -> fetch_docs -> planner -> code_proposal -> test_suggestion -> pr_composer -+
    /// ```
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            entry: StageId::FetchTicket,
            terminal: StageId::Finish,
            edges: &STANDARD_EDGES,
        }
    }

    /// Returns the first stage.
    #[must_use]
    pub const fn entry(&self) -> StageId {
        self.entry
    }

    /// Returns the stage every path ends at.
    #[must_use]
    pub const fn terminal(&self) -> StageId {
        self.terminal
    }

    /// Returns the outgoing edge of `stage`.
    #[must_use]
    pub fn edge(&self, stage: StageId) -> Option<Edge> {
        self.edges
            .iter()
            .find(|(from, _)| *from == stage)
            .map(|(_, edge)| *edge)
    }

    /// Returns the stage that follows `stage`, or `None` after the terminal.
    #[must_use]
    pub fn next(&self, stage: StageId, state: &RunState) -> Option<StageId> {
        if stage == self.terminal {
            return None;
        }
        match self.edge(stage)? {
            Edge::Fixed(next) => Some(next),
            Edge::Branch(branch) => Some(branch.resolve(state)),
        }
    }

    /// Returns every stage named by the graph, entry first.
    #[must_use]
    pub fn stages(&self) -> Vec<StageId> {
        let mut stages = vec![self.entry];
        for (from, edge) in self.edges {
            stages.push(*from);
            match edge {
                Edge::Fixed(next) => stages.push(*next),
                Edge::Branch(branch) => stages.extend(branch.targets()),
            }
        }
        stages.push(self.terminal);
        let mut seen = Vec::with_capacity(stages.len());
        for stage in stages {
            if !seen.contains(&stage) {
                seen.push(stage);
            }
        }
        seen
    }
}
