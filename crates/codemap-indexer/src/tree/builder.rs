//! Tree builder from walk results.

use super::{DirectoryTree, NodeId};
use crate::scanner::WalkEntry;
use std::collections::HashMap;
use tracing::debug;

/// Builds a [`DirectoryTree`] from walker output.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    dir_map: HashMap<String, NodeId>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from walk entries. Missing parent directories are
    /// created on demand, so entry order does not matter.
    pub fn build(mut self, entries: &[WalkEntry]) -> DirectoryTree {
        let mut tree = DirectoryTree::new();
        self.dir_map.insert(String::new(), DirectoryTree::ROOT);

        for entry in entries {
            if entry.relative.is_empty() {
                continue;
            }
            if entry.is_dir {
                self.ensure_directory(&entry.relative, &mut tree);
                continue;
            }

            let (parent_path, name) = split_parent(&entry.relative);
            let parent_id = self.ensure_directory(parent_path, &mut tree);
            tree.push(parent_id, name, &entry.relative, false);
        }

        tree.sort();

        debug!(
            entries = tree.len(),
            directories = self.dir_map.len() - 1,
            "Tree built"
        );

        tree
    }

    /// Ensure a directory and all its parents exist, returning its ID.
    fn ensure_directory(&mut self, relative: &str, tree: &mut DirectoryTree) -> NodeId {
        if let Some(&id) = self.dir_map.get(relative) {
            return id;
        }

        let (parent_path, name) = split_parent(relative);
        let parent_id = self.ensure_directory(parent_path, tree);
        let id = tree.push(parent_id, name, relative, true);
        self.dir_map.insert(relative.to_string(), id);
        id
    }
}

fn split_parent(relative: &str) -> (&str, &str) {
    relative.rsplit_once('/').unwrap_or(("", relative))
}
