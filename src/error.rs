//! Error types for the dirmerkle library
//!
//! This module defines all error types that can occur while building, diffing,
//! encoding or verifying directory trees. Only a handful of them are fatal for
//! the operation in progress; see [`DirMerkleError::is_recoverable`].

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the dirmerkle library
pub type Result<T> = std::result::Result<T, DirMerkleError>;

/// Main error type for all dirmerkle operations
#[derive(Debug, Error)]
pub enum DirMerkleError {
    /// A file could not be opened or fully read while hashing it
    #[error("Unreadable entry {path:?}: {source}")]
    Unreadable {
        /// Path of the entry that failed
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Build requested on a root that is missing or not a traversable directory
    #[error("Not a directory: {0:?}")]
    NotADirectory(PathBuf),

    /// Diff requested on two trees describing different roots
    #[error("Root mismatch - expected: {expected}, actual: {actual}")]
    RootMismatch {
        /// Root path of the expected tree
        expected: String,
        /// Root path of the actual tree
        actual: String,
    },

    /// Snapshot document is missing fields or has an inconsistent shape
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// I/O errors outside of file hashing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Pattern parsing error
    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<globset::Error> for DirMerkleError {
    fn from(err: globset::Error) -> Self {
        DirMerkleError::InvalidPattern(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for DirMerkleError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        DirMerkleError::ThreadPool(err.to_string())
    }
}

impl DirMerkleError {
    /// Create an unreadable-entry error
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DirMerkleError::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed snapshot error with a custom message
    pub fn malformed(msg: impl Into<String>) -> Self {
        DirMerkleError::MalformedSnapshot(msg.into())
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        DirMerkleError::Internal(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// A recoverable error only affects a single entry; the tree builder
    /// records it and keeps going. Everything else aborts the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DirMerkleError::Unreadable { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            DirMerkleError::NotADirectory(path) => {
                format!("{:?} is not a readable directory. Check the path and its permissions.", path)
            }
            DirMerkleError::RootMismatch { expected, actual } => {
                format!(
                    "Cannot compare trees rooted at '{}' and '{}'. \
                     Use --relative when building snapshots that should survive a move.",
                    expected, actual
                )
            }
            DirMerkleError::MalformedSnapshot(msg) => {
                format!("Snapshot could not be loaded ({}). Re-create it with 'dirmerkle snapshot'.", msg)
            }
            _ => self.to_string(),
        }
    }
}
