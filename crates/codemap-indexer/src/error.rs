//! Indexer error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during indexing operations.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or writing the generated document failed
    #[error("Failed to update {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Path not found
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Project root exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl IndexerError {
    /// Whether this error means the project root itself is gone.
    pub fn is_missing_root(&self) -> bool {
        matches!(self, IndexerError::NotFound(_) | IndexerError::NotADirectory(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndexerError::NotFound(PathBuf::from("/test/path"));
        assert!(err.to_string().contains("/test/path"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: IndexerError = io_err.into();
        assert!(matches!(err, IndexerError::Io(_)));
    }

    #[test]
    fn test_write_error_names_path() {
        let err = IndexerError::Document {
            path: PathBuf::from("/project/CLAUDE.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("CLAUDE.md"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_missing_root() {
        assert!(IndexerError::NotFound(PathBuf::from("/x")).is_missing_root());
        assert!(IndexerError::NotADirectory(PathBuf::from("/x")).is_missing_root());
        assert!(!IndexerError::Watcher("boom".into()).is_missing_root());
    }
}
