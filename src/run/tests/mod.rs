//! Unit tests for the run module.
//!
//! Tests are organised by component: the reducer and routing rules, the
//! graph and executor, the async bridge, the stages, and the services that
//! record runs and derive KPIs.

mod fixtures;
mod orchestrator_tests;
mod reconciler_tests;
