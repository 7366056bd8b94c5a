//! Data plumbing for the quality dashboard engine
//!
//! Query coordination (debounce, sequence-number discard) and the data
//! service implementations the engine is wired to.

pub mod coordinator;
pub mod sources;

use thiserror::Error;

// Re-exports
pub use coordinator::{QueryCoordinator, RowPredicate};
pub use sources::{JsonFileService, MemoryService};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed dataset: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service error: {0}")]
    Service(String),
}
