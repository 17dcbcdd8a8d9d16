use std::path::PathBuf;

use thiserror::Error;

use crate::vector::VectorError;

/// Errors raised by forward-index and clustered-posting backends.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Invalid storage format in '{path}': {reason}\nSuggestion: Rebuild the index with 'seismic index --force'"
    )]
    InvalidFormat { path: PathBuf, reason: String },

    #[error(
        "Invalid storage version: expected {expected}, got {actual}\nSuggestion: Migrate the storage format or rebuild the index"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
