//! Error types for byte stores

use std::io;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key not present
    #[error("key not found: {0}")]
    NotFound(String),

    /// Mutation attempted on a read-only store
    #[error("store is read-only, cannot modify {0}")]
    ReadOnly(String),

    /// Key is empty or escapes the store root
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
