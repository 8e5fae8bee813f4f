//! Scan, render, merge and write for one project.

use crate::config::{IndexSettings, ProjectConfig};
use crate::exclude::{IgnoreResolver, IgnoreRules};
use crate::merge::merge;
use crate::render::render;
use crate::scanner::{check_root, FileIndex, Scanner, Walker, GIT_DIR};
use crate::tree::{DirectoryTree, TreeBuilder};
use crate::watcher::{ChangeKind, FileChange};
use crate::IndexerError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of one regeneration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The document was created or rewritten
    Written { path: PathBuf, files: usize },
    /// The merged document matched what was on disk; nothing was written
    Unchanged { path: PathBuf },
}

impl UpdateOutcome {
    pub fn path(&self) -> &Path {
        match self {
            UpdateOutcome::Written { path, .. } | UpdateOutcome::Unchanged { path } => path,
        }
    }

    pub fn was_written(&self) -> bool {
        matches!(self, UpdateOutcome::Written { .. })
    }
}

/// Owns the scanner cache and settings for one project root.
///
/// Not internally synchronized: callers serialize passes for a project.
#[derive(Debug)]
pub struct ProjectIndexer {
    config: ProjectConfig,
    settings: IndexSettings,
    resolver: IgnoreResolver,
    scanner: Scanner,
}

impl ProjectIndexer {
    pub fn new(config: ProjectConfig, settings: IndexSettings) -> Self {
        let resolver = IgnoreResolver::new(&config.path, &config.ignore_patterns);
        Self {
            config,
            settings,
            resolver,
            scanner: Scanner::new(),
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn resolver(&self) -> &IgnoreResolver {
        &self.resolver
    }

    /// Path of the generated document.
    pub fn output_path(&self) -> PathBuf {
        self.resolver.root().join(&self.settings.output_file)
    }

    /// Whether `path` is the generated document, so writes to it can be
    /// kept from re-triggering regeneration.
    pub fn is_output_path(&self, path: &Path) -> bool {
        self.resolver.relative(path).as_deref() == Some(self.settings.output_file.as_str())
    }

    /// Whether a change notification should lead to a regeneration.
    ///
    /// Writes to the generated document, anything under `.git`, ignored
    /// paths and directory creation or modification are dropped. Directory
    /// deletions and moves still count, since they remove files.
    pub fn should_regenerate(&self, change: &FileChange) -> bool {
        if self.is_output_path(&change.path) {
            return false;
        }

        let Some(relative) = self.resolver.relative(&change.path) else {
            return false;
        };
        if relative.split('/').any(|part| part == GIT_DIR) {
            return false;
        }

        if change.is_dir && matches!(change.kind, ChangeKind::Created | ChangeKind::Modified) {
            return false;
        }

        !self.resolver.rules().matches_relative(&relative)
    }

    /// Scan the project, reusing records for unchanged files.
    pub fn scan(&mut self) -> Result<FileIndex, IndexerError> {
        let rules = self.resolver.rules();
        self.scanner.scan(&self.config, &self.settings, &rules)
    }

    /// Build the full directory tree, including files that are not indexed.
    /// The generated document itself is left out so that writing it does
    /// not change the next rendering.
    pub fn build_tree(&self) -> Result<DirectoryTree, IndexerError> {
        self.tree_with(self.resolver.rules())
    }

    fn tree_with(&self, rules: IgnoreRules) -> Result<DirectoryTree, IndexerError> {
        let root = check_root(&self.config.path)?;
        let entries: Vec<_> = Walker::new(&root, self.config.max_depth, rules)
            .walk()
            .into_iter()
            .filter(|e| e.relative != self.settings.output_file)
            .collect();
        Ok(TreeBuilder::new().build(&entries))
    }

    /// Render the generated section for the current state of the project.
    pub fn generate_index(&mut self) -> Result<String, IndexerError> {
        // One rules snapshot for both passes keeps them consistent.
        let rules = self.resolver.rules();
        let records = self.scanner.scan(&self.config, &self.settings, &rules)?;
        let tree = self.tree_with(rules)?;

        Ok(render(&records, &tree))
    }

    /// Regenerate the index and merge it into the document on disk. The
    /// file is only rewritten when its content would change.
    pub fn update_index(&mut self) -> Result<UpdateOutcome, IndexerError> {
        let rendered = self.generate_index()?;
        let path = self.output_path();

        let existing = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(source) => return Err(IndexerError::Document { path, source }),
        };

        let merged = merge(&existing, &rendered);
        if merged == existing {
            debug!(path = ?path, "Index unchanged");
            return Ok(UpdateOutcome::Unchanged { path });
        }

        fs::write(&path, &merged).map_err(|source| IndexerError::Document {
            path: path.clone(),
            source,
        })?;

        let files = self.scanner.cached().len();
        info!(path = ?path, files, "Index updated");
        Ok(UpdateOutcome::Written { path, files })
    }
}
