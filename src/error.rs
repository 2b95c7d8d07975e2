//! Structured error handling for the tracker core.
//!
//! Boundary-specific errors (`storage`, `client`, `scheduler`, `config`) are
//! defined next to their modules; this module unifies them behind a single
//! crate-wide error type and `Result` alias.

use thiserror::Error;

/// Top-level error type for the raffle tracker core.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Persistence boundary failure (key-value store or serialization).
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// External raffle gateway failure.
    #[error("API error: {0}")]
    Api(#[from] crate::client::ApiError),

    /// Scheduler lifecycle failure.
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Invalid domain input (empty identifiers, out-of-range values).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration loading or validation failure.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Destructive maintenance invoked without its preconditions.
    #[error("Maintenance error: {0}")]
    Maintenance(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
