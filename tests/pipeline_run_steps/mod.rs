//! Step definitions for pipeline run scenarios.

mod given;
mod then;
mod when;
pub mod world;
