//! Error types for the metric tree.

use std::io;
use thiserror::Error;

/// Errors that can occur while building, persisting or querying an M-tree.
#[derive(Debug, Error)]
pub enum MTreeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The caller violated an argument contract (for example `k == 0`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// An object or page that was referenced does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persisted data failed validation (bad magic, checksum mismatch, ...).
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Tree is closed")]
    Closed,
}

impl MTreeError {
    /// Returns true if the error was caused by the caller's arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, MTreeError::InvalidArgument(_))
    }
}

impl From<bincode::error::EncodeError> for MTreeError {
    fn from(err: bincode::error::EncodeError) -> Self {
        MTreeError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for MTreeError {
    fn from(err: bincode::error::DecodeError) -> Self {
        MTreeError::Serialization(err.to_string())
    }
}

/// Result type for M-tree operations
pub type MTreeResult<T> = Result<T, MTreeError>;
