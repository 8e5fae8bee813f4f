//! Directory tree of a project, as shown in the generated index.
//!
//! The tree holds every kept file and directory, indexed or not. Nodes live
//! in an arena and refer to each other by [`NodeId`].

mod builder;

pub use builder::TreeBuilder;

use serde::{Deserialize, Serialize};

/// Index of a node in the tree arena.
pub type NodeId = usize;

/// Box-drawing connectors used when rendering.
const BRANCH: &str = "├── ";
const CORNER: &str = "└── ";
const PIPE: &str = "│   ";
const SPACE: &str = "    ";

/// Directories and files under a project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryTree {
    nodes: Vec<TreeNode>,
}

/// One directory or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    /// Base name, empty for the root
    pub name: String,
    /// Slash-separated path relative to the root
    pub relative: String,
    pub is_dir: bool,
    /// Parent node ID (None for root)
    pub parent: Option<NodeId>,
    /// Child node IDs, ordered by label once built
    pub children: Vec<NodeId>,
}

impl TreeNode {
    /// Display label: directories carry a trailing slash.
    pub fn label(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

impl DirectoryTree {
    /// Root ID is always 0.
    pub const ROOT: NodeId = 0;

    /// Create a tree holding only the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                id: Self::ROOT,
                name: String::new(),
                relative: String::new(),
                is_dir: true,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[Self::ROOT]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Number of entries below the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a node by its relative path.
    pub fn find(&self, relative: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.relative == relative)
    }

    /// Get children of a node.
    pub fn children(&self, id: NodeId) -> Vec<&TreeNode> {
        self.get(id)
            .map(|n| n.children.iter().filter_map(|c| self.get(*c)).collect())
            .unwrap_or_default()
    }

    /// Render the tree with box-drawing connectors, one entry per line and
    /// no line for the root itself. An empty tree renders as an empty string.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        self.render_children(&mut lines, Self::ROOT, "");
        lines.join("\n")
    }

    fn render_children(&self, lines: &mut Vec<String>, id: NodeId, prefix: &str) {
        let children = self.children(id);
        let count = children.len();

        for (i, child) in children.into_iter().enumerate() {
            let is_last = i + 1 == count;
            let connector = if is_last { CORNER } else { BRANCH };
            lines.push(format!("{}{}{}", prefix, connector, child.label()));

            if child.is_dir {
                let extension = if is_last { SPACE } else { PIPE };
                self.render_children(lines, child.id, &format!("{}{}", prefix, extension));
            }
        }
    }

    pub(crate) fn push(
        &mut self,
        parent: NodeId,
        name: &str,
        relative: &str,
        is_dir: bool,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            id,
            name: name.to_string(),
            relative: relative.to_string(),
            is_dir,
            parent: Some(parent),
            children: Vec::new(),
        });
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    /// Order every child list by label.
    pub(crate) fn sort(&mut self) {
        let labels: Vec<String> = self.nodes.iter().map(TreeNode::label).collect();
        for node in &mut self.nodes {
            node.children.sort_by(|a, b| labels[*a].cmp(&labels[*b]));
        }
    }
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}
