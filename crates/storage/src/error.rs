//! Error types for chunk storage.

use thiserror::Error;

/// Errors that can occur while listing or fetching chunks.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Chunk not found: {0}")]
    NotFound(String),

    #[error("Invalid station identifier: '{0}'")]
    InvalidStation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using StorageError.
pub type Result<T> = std::result::Result<T, StorageError>;
