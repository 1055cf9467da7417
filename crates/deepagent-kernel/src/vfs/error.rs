//! VFS error types.

use thiserror::Error;

/// Errors from filesystem operations.
///
/// Every variant except [`VfsError::StorageUnavailable`] is something the
/// model can fix by calling the tool differently, so the tool layer reports
/// them back as tool results instead of aborting the invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    /// No entry at this path.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// An edit's match string did not occur exactly once.
    #[error("no unique match in {path}: found {occurrences} occurrence(s)")]
    NoMatch { path: String, occurrences: usize },

    /// Path is malformed or tries to escape the root.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Glob or regex pattern could not be compiled.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The storage layer underneath a backend failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn no_match(path: impl Into<String>, occurrences: usize) -> Self {
        Self::NoMatch {
            path: path.into(),
            occurrences,
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(msg.to_string())
    }

    /// The offending path, when the error has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::NotFound { path } | Self::NoMatch { path, .. } | Self::InvalidPath { path, .. } => {
                Some(path)
            }
            Self::InvalidPattern { .. } | Self::StorageUnavailable(_) => None,
        }
    }

    /// Whether the model loop can recover from this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_))
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
