//! Adapter implementations for run ports.

pub mod memory;
pub mod sqlite;
