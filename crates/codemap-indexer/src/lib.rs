//! Codemap Indexer
//!
//! This crate provides the indexing engine for codemap, including:
//! - Structural extraction of functions, classes and imports per language
//! - Ignore resolution from configured patterns and `.gitignore`
//! - Depth-limited directory scanning with a content-hash cache
//! - Deterministic markdown rendering and merging into an existing document
//! - File watching with a short native debounce

pub mod config;
mod error;
pub mod exclude;
pub mod extract;
pub mod merge;
pub mod pipeline;
pub mod render;
pub mod scanner;
pub mod tree;
pub mod watcher;

pub use config::{IndexSettings, ProjectConfig, DEFAULT_OUTPUT_FILE};
pub use error::IndexerError;
pub use exclude::{IgnoreResolver, IgnoreRules};
pub use extract::{
    detect_language, extract, ClassRecord, Extraction, FunctionKind, FunctionRecord, Language,
};
pub use merge::merge;
pub use pipeline::{ProjectIndexer, UpdateOutcome};
pub use render::render;
pub use scanner::{FileIndex, FileRecord, Scanner};
pub use tree::{DirectoryTree, TreeBuilder};
pub use watcher::{ChangeKind, FileChange, FileWatcher, WatcherOptions};
