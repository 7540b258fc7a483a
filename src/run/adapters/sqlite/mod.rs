//! `SQLite` adapters for run history persistence.

mod metrics;
mod models;
mod repository;
mod schema;

pub use repository::{RunSqlitePool, SqliteRunRepository};
