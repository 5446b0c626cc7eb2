//! Error types for the retrieval core
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::vector::VectorError;

/// Main error type for repository indexing operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Persisted state exists but could not be restored. Recoverable: the
    /// caller falls back to a full rebuild.
    #[error("Failed to load index from '{path}': {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// A save operation failed. The previously persisted state remains
    /// intact and loadable.
    #[error("Failed to persist index to '{path}': {source}")]
    PersistFailed {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Vector index and document store lengths diverged. This is a bug in
    /// the build pipeline, not a user error.
    #[error(
        "Index misaligned: {vectors} vectors but {documents} documents. The index must be rebuilt."
    )]
    Misaligned { vectors: usize, documents: usize },

    /// Errors from the vector layer (dimension mismatches, storage format)
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// No index has been built or loaded for this session yet
    #[error("Session has no index. Run initialization before searching.")]
    NotInitialized,

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

impl IndexError {
    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::LoadFailed { .. } => vec![
                "The persisted index is missing artifacts or corrupted",
                "Run 'codequery index --force' to rebuild from scratch",
            ],
            Self::Misaligned { .. } => vec![
                "Run 'codequery index --force' to rebuild from scratch",
                "If this recurs, check for disk errors or filesystem corruption",
            ],
            Self::PersistFailed { .. } => vec![
                "Check disk space and permissions in the index directory",
                "The previous index (if any) is still intact",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::NotInitialized => {
                vec!["Run 'codequery index <repository>' before searching"]
            }
            _ => vec![],
        }
    }
}
