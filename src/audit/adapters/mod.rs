//! Activity sink adapters.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlActivityLog;
pub use memory::InMemoryActivityLog;
