//! Core error types for codemap.

use codemap_indexer::IndexerError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid project path
    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    /// The path is not in the project registry
    #[error("Project not registered: {}", .0.display())]
    NotRegistered(PathBuf),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}
