//! Depth-limited directory walker with ignore pruning.

use crate::exclude::{slash_path, IgnoreRules};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory that is never walked, regardless of configured patterns.
pub const GIT_DIR: &str = ".git";

/// A discovered file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Absolute path
    pub path: PathBuf,
    /// Slash-separated path relative to the walk root
    pub relative: String,
    /// Number of directories between the root and this entry
    pub depth: usize,
    pub is_dir: bool,
}

/// Walks a project root top-down, pruning ignored directories before
/// descending and never entering directories deeper than `max_depth`.
pub struct Walker {
    root: PathBuf,
    max_depth: usize,
    rules: IgnoreRules,
}

impl Walker {
    /// Create a walker for `root` using a snapshot of the ignore rules.
    pub fn new(root: &Path, max_depth: usize, rules: IgnoreRules) -> Self {
        Self {
            root: root.to_path_buf(),
            max_depth,
            rules,
        }
    }

    /// Walk the tree and return every kept entry in lexicographic order,
    /// parents before children. The root itself is not included.
    ///
    /// Symlinks are kept only when their target resolves under the root.
    /// Dangling links are kept so the scanner can report them.
    pub fn walk(&self) -> Vec<WalkEntry> {
        let root = self.root.clone();
        let resolved_root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        let rules = self.rules.clone();

        // A file inside a directory at depth `max_depth` sits one level lower
        // in the walk, so the walk goes one further than the directory limit.
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .follow_links(false)
            .max_depth(Some(self.max_depth + 1))
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if entry.file_name() == GIT_DIR {
                    return false;
                }
                if entry.path_is_symlink() && !link_inside(entry.path(), &resolved_root) {
                    debug!(path = ?entry.path(), "Skipping symlink outside root");
                    return false;
                }
                match entry.path().strip_prefix(&root) {
                    Ok(relative) => !rules.matches_relative(&slash_path(relative)),
                    Err(_) => false,
                }
            })
            .build();

        let mut entries = Vec::new();
        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    // Don't fail the entire walk for individual errors
                    debug!(error = %e, "Walk error");
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };

            entries.push(WalkEntry {
                path: entry.path().to_path_buf(),
                relative: slash_path(relative),
                depth: entry.depth() - 1,
                is_dir: entry.file_type().is_some_and(|ft| ft.is_dir()),
            });
        }

        entries
    }
}

fn link_inside(path: &Path, root: &Path) -> bool {
    match path.canonicalize() {
        Ok(target) => target.starts_with(root),
        Err(_) => true,
    }
}
