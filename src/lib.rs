//! Pipewright: ticket-to-pull-request run orchestration.
//!
//! This crate drives a multi-stage, model-assisted pipeline that turns a
//! tracked ticket into a reviewed code change proposal. It routes through a
//! completeness gate, records an append-only activity trail, persists every
//! run and derives delivery KPIs from the stored history.
//!
//! # Architecture
//!
//! Pipewright follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (`SQLite`, JSON lines,
//!   in-memory)
//!
//! # Modules
//!
//! - [`audit`]: Structured activity trail
//! - [`config`]: TOML pipeline configuration
//! - [`logging`]: Diagnostic tracing bootstrap
//! - [`run`]: Run state, stage graph, executor, persistence and KPIs

pub mod audit;
pub mod config;
pub mod logging;
pub mod run;
