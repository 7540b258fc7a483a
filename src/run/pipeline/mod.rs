//! Stage contract, pipeline graph and the executor that drives a run.
//!
//! The graph is a static adjacency table with one conditional branch after
//! the completeness check. The executor walks it from the entry stage,
//! folding each stage's update into the run state, and diverts any
//! unexpected stage fault to the terminal stage so a run always ends with a
//! final state.

pub mod bridge;
mod executor;
mod graph;
mod routing;
mod stage;

pub use bridge::{BridgeError, block_on};
pub use executor::{Executor, ExecutorError};
pub use graph::{BranchPoint, Edge, PipelineGraph};
pub use routing::{RouteDecision, route_after_completeness};
pub use stage::{Stage, StageFailure, StageFault, StageId, StageRegistry};
