//! Error types for the sparse index
//!
//! Each layer has its own thiserror enum; [`IndexError`] is what the engine
//! and the CLI surface, with stable status codes and recovery hints.

use std::path::PathBuf;

use thiserror::Error;

use crate::clustering::ClusteringError;
use crate::query::QueryError;
use crate::storage::StorageError;
use crate::vector::VectorError;

/// Main error type for index operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed vector input
    #[error("Invalid vector input: {0}")]
    Vector(#[from] VectorError),

    /// Storage errors
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Clustering failed: {0}")]
    Clustering(#[from] ClusteringError),

    #[error("Search failed: {0}")]
    Query(#[from] QueryError),

    /// The id reserved as the end-of-iteration sentinel
    #[error("Document id {doc_id} is reserved and cannot be indexed")]
    ReservedDocId { doc_id: u32 },

    #[error("No index found at '{path}'")]
    IndexNotFound { path: PathBuf },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// Corrupted index error
    #[error("Index appears to be corrupted: {reason}")]
    IndexCorrupted { reason: String },

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::Vector(_) => "INVALID_VECTOR",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Clustering(ClusteringError::InvalidParameters(_)) => "INVALID_PARAMETERS",
            Self::Clustering(_) => "CLUSTERING_ERROR",
            Self::Query(QueryError::InvalidParameter(_)) => "INVALID_QUERY",
            Self::Query(_) => "SEARCH_ERROR",
            Self::ReservedDocId { .. } => "RESERVED_DOC_ID",
            Self::IndexNotFound { .. } => "INDEX_NOT_FOUND",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::IndexCorrupted { .. } => "INDEX_CORRUPTED",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::IndexCorrupted { .. }
            | Self::Storage(StorageError::InvalidFormat { .. })
            | Self::Storage(StorageError::VersionMismatch { .. }) => vec![
                "Run 'seismic index --force' to rebuild from scratch",
                "Check for disk errors or filesystem corruption",
            ],
            Self::IndexNotFound { .. } => vec![
                "Run 'seismic index <file.jsonl>' to build an index first",
                "Check index_path in .seismic/settings.toml",
            ],
            Self::Vector(_) => vec![
                "Token keys must be decimal integers between 0 and 65535",
                "Weights must be numbers; negative weights are clamped to zero",
            ],
            Self::ReservedDocId { .. } => vec!["Document ids must be below 4294967295"],
            Self::Clustering(ClusteringError::InvalidParameters(_)) => vec![
                "cluster_ratio must be in (0, 1) and summary_prune_ratio in (0, 1]",
                "Run 'seismic config' to inspect the effective settings",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::FileWrite { .. } => vec!["Check disk space and permissions in the index directory"],
            _ => vec![],
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, IndexError>;

    /// Add context with a path
    fn with_path(self, path: &std::path::Path) -> Result<T, IndexError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::General(format!("{msg}: {e}")))
    }

    fn with_path(self, path: &std::path::Path) -> Result<T, IndexError> {
        self.map_err(|e| {
            IndexError::General(format!("Error processing '{}': {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = IndexError::from(ClusteringError::InvalidParameters(vec!["x".to_string()]));
        assert_eq!(err.status_code(), "INVALID_PARAMETERS");
        assert!(!err.recovery_suggestions().is_empty());

        let err = IndexError::IndexNotFound {
            path: PathBuf::from("/tmp/none"),
        };
        assert_eq!(err.status_code(), "INDEX_NOT_FOUND");
    }

    #[test]
    fn test_context_wraps_message() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("disk gone"));
        let err = result.context("Saving index").unwrap_err();
        assert_eq!(err.to_string(), "Saving index: disk gone");
    }
}
