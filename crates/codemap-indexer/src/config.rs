//! Per-project indexing configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the generated document written at each project root.
pub const DEFAULT_OUTPUT_FILE: &str = "CLAUDE.md";

/// Configuration for one monitored project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path to the project root
    pub path: PathBuf,

    /// Whether the project is monitored
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Ordered glob-like ignore patterns
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// File suffixes (with leading dot) that are indexed
    #[serde(default)]
    pub file_extensions: BTreeSet<String>,

    /// Files larger than this many bytes are skipped entirely
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Directory depth limit, root = 0
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Index recognized manifest files regardless of extension
    #[serde(default = "default_enabled")]
    pub include_config_files: bool,

    /// Debounce window in seconds
    #[serde(default = "default_update_delay")]
    pub update_delay: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    1024 * 1024 // 1MB
}

fn default_max_depth() -> usize {
    10
}

fn default_update_delay() -> f64 {
    2.0
}

impl ProjectConfig {
    /// Create a config for `path` with empty pattern lists and default limits.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            ignore_patterns: Vec::new(),
            file_extensions: BTreeSet::new(),
            max_file_size: default_max_file_size(),
            max_depth: default_max_depth(),
            include_config_files: true,
            update_delay: default_update_delay(),
        }
    }

    /// Builder-style helper for extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style helper for ignore patterns.
    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// The debounce window as a [`Duration`]. Negative or NaN delays clamp to zero.
    pub fn debounce_window(&self) -> Duration {
        if self.update_delay.is_finite() && self.update_delay > 0.0 {
            Duration::from_secs_f64(self.update_delay)
        } else {
            Duration::ZERO
        }
    }

    /// Whether `path` has one of the configured extensions.
    pub fn has_indexed_extension(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.file_extensions.contains(&format!(".{}", ext)),
            None => false,
        }
    }
}

/// Settings shared by every project, fixed at indexer construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    /// Recognized manifest filenames (matched against the base name)
    pub manifest_files: BTreeSet<String>,
    /// File name of the generated document at the project root
    pub output_file: String,
}

impl IndexSettings {
    pub fn is_manifest(&self, file_name: &str) -> bool {
        self.manifest_files.contains(file_name)
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            manifest_files: [
                "package.json",
                "requirements.txt",
                "setup.py",
                "pyproject.toml",
                "Cargo.toml",
                "go.mod",
                "composer.json",
                "Gemfile",
                ".env.example",
                "Dockerfile",
                "docker-compose.yml",
                ".gitignore",
                "Makefile",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_config_defaults() {
        let config = ProjectConfig::new("/test/path");
        assert!(config.enabled);
        assert!(config.include_config_files);
        assert_eq!(config.max_file_size, 1024 * 1024);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.debounce_window(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ProjectConfig =
            serde_json::from_str(r#"{"path": "/p", "file_extensions": [".py"]}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("/p"));
        assert!(config.enabled);
        assert_eq!(config.max_depth, 10);
        assert!(config.file_extensions.contains(".py"));
    }

    #[test]
    fn test_has_indexed_extension() {
        let config = ProjectConfig::new("/p").with_extensions([".py", ".rs"]);
        assert!(config.has_indexed_extension(Path::new("src/main.rs")));
        assert!(config.has_indexed_extension(Path::new("a.py")));
        assert!(!config.has_indexed_extension(Path::new("a.pyc")));
        assert!(!config.has_indexed_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_negative_delay_clamps() {
        let mut config = ProjectConfig::new("/p");
        config.update_delay = -1.0;
        assert_eq!(config.debounce_window(), Duration::ZERO);
    }

    #[test]
    fn test_default_manifests() {
        let settings = IndexSettings::default();
        assert!(settings.is_manifest("Cargo.toml"));
        assert!(settings.is_manifest("package.json"));
        assert!(!settings.is_manifest("main.rs"));
        assert_eq!(settings.output_file, "CLAUDE.md");
    }
}
