//! Storage layer error types
//!
//! All errors that can occur inside the object store, the reference manager
//! and the commit graph are defined here.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::InvalidNameError;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// the requested blob is not in the object store
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// the requested commit is not in the object store
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// an abbreviated commit id matched zero or several commits
    #[error("commit prefix '{prefix}' matched {matches} commits")]
    AmbiguousOrNotFound { prefix: String, matches: usize },

    /// the specified branch was not found
    #[error("branch not found: {0}")]
    RefNotFound(String),

    /// branch already exists
    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// the operation is not allowed in the current reference state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// invalid branch name or path
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// data integrity check failed, or an expected reference is missing
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: PathBuf, reason: String },

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the object or ref doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::BlobNotFound(_)
                | StorageError::CommitNotFound(_)
                | StorageError::RefNotFound(_)
                | StorageError::AmbiguousOrNotFound { .. }
        )
    }

    /// check if this error means the repository metadata is damaged
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::CorruptedData { .. })
    }

    pub(crate) fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StorageError::CorruptedData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::CommitNotFound("abc".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_corruption());

        let ambiguous = StorageError::AmbiguousOrNotFound {
            prefix: "ab".to_string(),
            matches: 2,
        };
        assert!(ambiguous.is_not_found());

        let corrupt = StorageError::corrupted(".gitlite/HEAD", "missing");
        assert!(corrupt.is_corruption());
        assert!(!corrupt.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = StorageError::AmbiguousOrNotFound {
            prefix: "a1".to_string(),
            matches: 0,
        };
        assert_eq!(err.to_string(), "commit prefix 'a1' matched 0 commits");
    }
}
