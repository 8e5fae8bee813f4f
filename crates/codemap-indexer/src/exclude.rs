//! Ignore resolution for project paths.
//!
//! Two pattern sources are consulted in order: the project's configured
//! `ignore_patterns`, then the lines of the root `.gitignore`. The first
//! match wins. Plain patterns that are neither exact nor globbed fall back
//! to a substring test on the relative path.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Name of the repository ignore file read from the project root.
pub const GITIGNORE_FILE: &str = ".gitignore";

/// Decides whether paths under a project root are excluded from indexing.
#[derive(Debug, Clone)]
pub struct IgnoreResolver {
    root: PathBuf,
    patterns: Vec<String>,
}

impl IgnoreResolver {
    /// Create a resolver for `root` with the configured patterns.
    pub fn new(root: &Path, patterns: &[String]) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            patterns: patterns.to_vec(),
        }
    }

    /// The resolved project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot of the current rules, re-reading `.gitignore` from disk.
    pub fn rules(&self) -> IgnoreRules {
        IgnoreRules {
            patterns: self.patterns.clone(),
            gitignore: read_gitignore(&self.root),
        }
    }

    /// Whether `path` is excluded. Paths outside the root are always excluded.
    pub fn should_ignore(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(relative) => self.rules().matches_relative(&relative),
            None => true,
        }
    }

    /// Slash-separated path of `path` relative to the root, or `None` when the
    /// path does not lie under it.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let resolved = resolve(&self.root, path);
        let relative = resolved.strip_prefix(&self.root).ok()?;
        Some(slash_path(relative))
    }
}

/// A loaded set of ignore rules, cheap to clone into walker filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRules {
    patterns: Vec<String>,
    gitignore: Vec<String>,
}

impl IgnoreRules {
    /// Rules from explicit pattern lists, without touching the filesystem.
    pub fn from_parts(patterns: Vec<String>, gitignore: Vec<String>) -> Self {
        Self {
            patterns,
            gitignore,
        }
    }

    /// Whether a root-relative, slash-separated path is excluded.
    /// The root itself (an empty path) is never excluded.
    pub fn matches_relative(&self, relative: &str) -> bool {
        let relative = relative.trim_matches('/');
        if relative.is_empty() {
            return false;
        }

        let parts: Vec<&str> = relative.split('/').collect();
        let name = parts.last().copied().unwrap_or(relative);

        if let Some(pattern) = self
            .patterns
            .iter()
            .find(|p| configured_match(p, &parts, name))
        {
            debug!(path = relative, pattern = %pattern, "Ignored by configured pattern");
            return true;
        }

        if let Some(pattern) = self
            .gitignore
            .iter()
            .find(|p| gitignore_match(p, relative, &parts, name))
        {
            debug!(path = relative, pattern = %pattern, "Ignored by .gitignore");
            return true;
        }

        false
    }
}

fn configured_match(pattern: &str, parts: &[&str], name: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => parts.contains(&pattern) || name == pattern,
    }
}

fn gitignore_match(pattern: &str, relative: &str, parts: &[&str], name: &str) -> bool {
    let pattern = pattern.replace('\\', "/");

    if let Some(idx) = pattern.rfind("**/") {
        let suffix = pattern[idx + 3..].trim_end_matches('/');
        return segment_match(suffix, parts, name);
    }

    if let Some(dir) = pattern.strip_suffix('/') {
        let dir = dir.trim_start_matches('/');
        if dir.contains('/') {
            return under(relative, dir);
        }
        return parts.contains(&dir) || name == dir;
    }

    if let Some(anchored) = pattern.strip_prefix('/') {
        return under(relative, anchored);
    }

    if pattern == relative || pattern == name {
        return true;
    }

    // Extension globs compare against the base name
    if let Some(suffix) = pattern.strip_prefix('*') {
        if !suffix.contains('*') {
            return name.ends_with(suffix);
        }
    }

    relative.contains(pattern.as_str())
}

fn segment_match(pattern: &str, parts: &[&str], name: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    match pattern.strip_prefix('*') {
        Some(suffix) if !suffix.contains('*') => name.ends_with(suffix),
        _ => parts.contains(&pattern) || name == pattern,
    }
}

fn under(relative: &str, prefix: &str) -> bool {
    relative == prefix
        || relative
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Non-empty, non-comment lines of `<root>/.gitignore`. Negations are not
/// supported and are dropped.
fn read_gitignore(root: &Path) -> Vec<String> {
    let path = root.join(GITIGNORE_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .map(String::from)
        .collect()
}

/// Resolve symlinks and relative segments. Paths that no longer exist (delete
/// events) resolve through their parent, falling back to lexical cleanup.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    if let Ok(resolved) = absolute.canonicalize() {
        return resolved;
    }

    if let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) {
        if let Ok(parent) = parent.canonicalize() {
            return parent.join(name);
        }
    }

    lexical(&absolute)
}

fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join path components with forward slashes.
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
