//! Run orchestration for Pipewright.
//!
//! A run takes one ticket through a fixed graph of stages: fetching the
//! ticket, judging its completeness, then either asking the reporter for
//! clarification or scouting the repository, gathering documentation,
//! planning, proposing code, suggesting tests and opening a pull request.
//! Each stage returns a partial update that the reducer folds into the
//! run's state. Finished runs are recorded durably and feed the pipeline
//! KPIs. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - The stage graph and executor in [`pipeline`]
//! - Concrete stages in [`stages`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod pipeline;
pub mod ports;
pub mod services;
pub mod stages;

#[cfg(test)]
mod tests;
