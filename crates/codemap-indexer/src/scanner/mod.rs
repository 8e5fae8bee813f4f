//! Directory scanning with a content-hash cache.
//!
//! The scanner walks a project root, keeps the files worth indexing and
//! runs structure extraction on each one. Records are cached by relative
//! path; a file whose content hash is unchanged since the previous scan
//! reuses its previous record without re-extracting.

mod walker;

pub use walker::{WalkEntry, Walker, GIT_DIR};

use crate::config::{IndexSettings, ProjectConfig};
use crate::exclude::IgnoreRules;
use crate::extract::{
    comment_summary, detect_language, extract, ClassRecord, Extraction, FunctionRecord, Language,
};
use crate::IndexerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Structural summary of one indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Slash-separated path relative to the project root, unique per scan
    pub relative_path: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp)
    pub modified_time: u64,
    /// Content hash (SHA256), used only for change detection
    pub content_hash: String,
    pub language: Option<Language>,
    pub functions: Vec<FunctionRecord>,
    pub classes: Vec<ClassRecord>,
    /// Import targets as written, duplicates kept
    pub imports: Vec<String>,
    /// Summary of a leading comment line
    pub description: Option<String>,
    /// Whether the base name is a recognized manifest file
    pub is_manifest: bool,
}

/// Scan output keyed by relative path.
pub type FileIndex = BTreeMap<String, Arc<FileRecord>>;

/// Scans one project root and keeps the records of the previous scan.
#[derive(Debug, Default)]
pub struct Scanner {
    cache: FileIndex,
}

#[derive(Debug, Default)]
struct ScanStats {
    extracted: usize,
    reused: usize,
    retained: usize,
    skipped: usize,
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records from the most recent scan.
    pub fn cached(&self) -> &FileIndex {
        &self.cache
    }

    /// Scan the project described by `config`.
    ///
    /// The result replaces the cache in full: files that disappeared or are
    /// now ignored are dropped. A file that cannot be read this pass keeps
    /// its previous record.
    pub fn scan(
        &mut self,
        config: &ProjectConfig,
        settings: &IndexSettings,
        rules: &IgnoreRules,
    ) -> Result<FileIndex, IndexerError> {
        let start = Instant::now();
        let root = check_root(&config.path)?;

        debug!(path = ?root, "Starting scan");

        let entries = Walker::new(&root, config.max_depth, rules.clone()).walk();

        let mut index = FileIndex::new();
        let mut stats = ScanStats::default();

        for entry in entries {
            if entry.is_dir
                || entry.relative == settings.output_file
                || !is_indexable(&entry.path, config, settings)
            {
                continue;
            }

            let cached = self.cache.get(&entry.relative);

            let metadata = match fs::metadata(&entry.path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = ?entry.path, error = %e, "Failed to stat file");
                    retain(&mut index, &entry.relative, cached, &mut stats);
                    continue;
                }
            };

            if metadata.len() > config.max_file_size {
                debug!(path = ?entry.path, size = metadata.len(), "Skipping large file");
                stats.skipped += 1;
                continue;
            }

            let bytes = match fs::read(&entry.path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = ?entry.path, error = %e, "Failed to read file");
                    retain(&mut index, &entry.relative, cached, &mut stats);
                    continue;
                }
            };

            let hash = compute_hash(&bytes);
            if let Some(previous) = cached.filter(|r| r.content_hash == hash) {
                stats.reused += 1;
                index.insert(entry.relative, Arc::clone(previous));
                continue;
            }

            let modified_time = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);

            let record = build_record(
                &entry,
                &bytes,
                hash,
                metadata.len(),
                modified_time,
                settings,
            );
            stats.extracted += 1;
            index.insert(entry.relative, Arc::new(record));
        }

        info!(
            path = ?root,
            files = index.len(),
            extracted = stats.extracted,
            reused = stats.reused,
            retained = stats.retained,
            skipped = stats.skipped,
            duration_ms = start.elapsed().as_millis(),
            "Scan complete"
        );

        self.cache = index.clone();
        Ok(index)
    }
}

/// Verify the project root and return its canonical form.
pub(crate) fn check_root(path: &Path) -> Result<PathBuf, IndexerError> {
    let metadata = fs::metadata(path).map_err(|_| IndexerError::NotFound(path.to_path_buf()))?;
    if !metadata.is_dir() {
        return Err(IndexerError::NotADirectory(path.to_path_buf()));
    }
    Ok(path.canonicalize()?)
}

fn is_indexable(path: &Path, config: &ProjectConfig, settings: &IndexSettings) -> bool {
    if config.has_indexed_extension(path) {
        return true;
    }
    config.include_config_files
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| settings.is_manifest(name))
}

fn retain(
    index: &mut FileIndex,
    relative: &str,
    cached: Option<&Arc<FileRecord>>,
    stats: &mut ScanStats,
) {
    match cached {
        Some(previous) => {
            stats.retained += 1;
            index.insert(relative.to_string(), Arc::clone(previous));
        }
        None => stats.skipped += 1,
    }
}

fn build_record(
    entry: &WalkEntry,
    bytes: &[u8],
    content_hash: String,
    size: u64,
    modified_time: u64,
    settings: &IndexSettings,
) -> FileRecord {
    let content = String::from_utf8_lossy(bytes);
    let language = detect_language(&entry.path);
    let Extraction {
        functions,
        classes,
        imports,
    } = language
        .map(|lang| extract(&content, lang))
        .unwrap_or_default();

    let is_manifest = entry
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| settings.is_manifest(name));

    FileRecord {
        path: entry.path.clone(),
        relative_path: entry.relative.clone(),
        size,
        modified_time,
        content_hash,
        language,
        functions,
        classes,
        imports,
        description: file_description(&content),
        is_manifest,
    }
}

/// Summary of the first line when it is a comment. Shebangs don't count.
pub fn file_description(content: &str) -> Option<String> {
    let first = content.lines().next()?.trim();
    if first.starts_with("#!") {
        return None;
    }
    if ["#", "//", "/*", ";"].iter().any(|p| first.starts_with(p)) {
        comment_summary(first)
    } else {
        None
    }
}

/// Compute SHA256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn py_config(root: &Path) -> ProjectConfig {
        ProjectConfig::new(root).with_extensions([".py"])
    }

    fn scan(scanner: &mut Scanner, config: &ProjectConfig) -> FileIndex {
        scanner
            .scan(config, &IndexSettings::default(), &IgnoreRules::default())
            .unwrap()
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = tempdir().unwrap();
        let mut scanner = Scanner::new();

        let index = scan(&mut scanner, &py_config(temp_dir.path()));
        assert!(index.is_empty());
    }

    #[test]
    fn test_scan_missing_root() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("gone");
        let mut scanner = Scanner::new();

        let err = scanner
            .scan(&py_config(&missing), &IndexSettings::default(), &IgnoreRules::default())
            .unwrap_err();
        assert!(matches!(err, IndexerError::NotFound(_)));
    }

    #[test]
    fn test_scan_root_is_file() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("a.py");
        fs::write(&file, "").unwrap();
        let mut scanner = Scanner::new();

        let err = scanner
            .scan(&py_config(&file), &IndexSettings::default(), &IgnoreRules::default())
            .unwrap_err();
        assert!(matches!(err, IndexerError::NotADirectory(_)));
    }

    #[test]
    fn test_scan_filters_by_extension_and_manifest() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("app.py"), "def run():\n    pass\n").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "text").unwrap();
        fs::write(temp_dir.path().join("requirements.txt"), "# deps\nrequests\n").unwrap();

        let mut scanner = Scanner::new();
        let index = scan(&mut scanner, &py_config(temp_dir.path()));

        let keys: Vec<_> = index.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["app.py", "requirements.txt"]);
        assert!(index["requirements.txt"].is_manifest);
        assert_eq!(index["requirements.txt"].description.as_deref(), Some("deps"));
        assert_eq!(index["app.py"].language, Some(Language::Python));
        assert_eq!(index["app.py"].functions[0].name, "run");
    }

    #[test]
    fn test_scan_never_indexes_output_file() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("CLAUDE.md"), "# Index\n").unwrap();
        fs::write(temp_dir.path().join("README.md"), "# Readme\n").unwrap();

        let config = ProjectConfig::new(temp_dir.path()).with_extensions([".md"]);
        let mut scanner = Scanner::new();
        let index = scan(&mut scanner, &config);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["README.md"]);
    }

    #[test]
    fn test_scan_without_config_files() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Makefile"), "all:\n").unwrap();

        let mut config = py_config(temp_dir.path());
        config.include_config_files = false;

        let mut scanner = Scanner::new();
        assert!(scan(&mut scanner, &config).is_empty());
    }

    #[test]
    fn test_scan_skips_large_files() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        fs::write(temp_dir.path().join("small.py"), "x = 1\n").unwrap();

        let mut config = py_config(temp_dir.path());
        config.max_file_size = 50;

        let mut scanner = Scanner::new();
        let index = scan(&mut scanner, &config);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["small.py"]);
    }

    #[test]
    fn test_scan_reuses_unchanged_records() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        fs::write(temp_dir.path().join("b.py"), "def b():\n    pass\n").unwrap();

        let config = py_config(temp_dir.path());
        let mut scanner = Scanner::new();
        let first = scan(&mut scanner, &config);

        // Same structure, different bytes
        fs::write(temp_dir.path().join("b.py"), "def b():\n    pass  # edited\n").unwrap();
        let second = scan(&mut scanner, &config);

        assert!(Arc::ptr_eq(&first["a.py"], &second["a.py"]));
        assert!(!Arc::ptr_eq(&first["b.py"], &second["b.py"]));
        assert_eq!(first["b.py"].functions, second["b.py"].functions);
    }

    #[test]
    fn test_scan_drops_removed_files() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.py"), "").unwrap();
        fs::write(temp_dir.path().join("b.py"), "").unwrap();

        let config = py_config(temp_dir.path());
        let mut scanner = Scanner::new();
        assert_eq!(scan(&mut scanner, &config).len(), 2);

        fs::remove_file(temp_dir.path().join("b.py")).unwrap();
        let index = scan(&mut scanner, &config);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["a.py"]);
        assert_eq!(scanner.cached().len(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn test_scan_retains_record_when_unreadable() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("a.py");
        fs::write(&file, "def a():\n    pass\n").unwrap();

        let config = py_config(temp_dir.path());
        let mut scanner = Scanner::new();
        let first = scan(&mut scanner, &config);

        // Still listed by the walk, but stat and read now fail
        fs::remove_file(&file).unwrap();
        symlink(temp_dir.path().join("missing.py"), &file).unwrap();

        let second = scan(&mut scanner, &config);
        assert!(Arc::ptr_eq(&first["a.py"], &second["a.py"]));
        assert!(Arc::ptr_eq(&first["a.py"], &scanner.cached()["a.py"]));

        // Without a previous record the file is skipped
        symlink(temp_dir.path().join("missing.py"), temp_dir.path().join("b.py")).unwrap();
        let third = scan(&mut scanner, &config);
        assert_eq!(third.keys().collect::<Vec<_>>(), vec!["a.py"]);
    }

    #[test]
    fn test_scan_applies_ignore_rules() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir(temp_dir.path().join("build")).unwrap();
        fs::write(temp_dir.path().join("build/gen.py"), "").unwrap();
        fs::write(temp_dir.path().join("main.py"), "").unwrap();
        fs::write(temp_dir.path().join("main.pyc"), "").unwrap();

        let mut config = py_config(temp_dir.path());
        config.file_extensions.insert(".pyc".to_string());

        let rules = IgnoreRules::from_parts(vec!["*.pyc".to_string()], vec!["build/".to_string()]);
        let mut scanner = Scanner::new();
        let index = scanner
            .scan(&config, &IndexSettings::default(), &rules)
            .unwrap();

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["main.py"]);
    }

    #[test]
    fn test_relative_paths_use_forward_slashes() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("pkg/sub")).unwrap();
        fs::write(temp_dir.path().join("pkg/sub/mod.py"), "").unwrap();

        let mut scanner = Scanner::new();
        let index = scan(&mut scanner, &py_config(temp_dir.path()));
        assert!(index.contains_key("pkg/sub/mod.py"));
    }

    #[test]
    fn test_file_description() {
        assert_eq!(file_description("# Utilities\nx = 1").as_deref(), Some("Utilities"));
        assert_eq!(file_description("// Entry\n").as_deref(), Some("Entry"));
        assert_eq!(file_description("/* Block */\n").as_deref(), Some("Block"));
        assert_eq!(file_description("#!/usr/bin/env python\n"), None);
        assert_eq!(file_description("import os\n"), None);
        assert_eq!(file_description("#\n"), None);
        assert_eq!(file_description(""), None);
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello world");
        let hash2 = compute_hash(b"hello world");
        let hash3 = compute_hash(b"different");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64); // SHA256 hex length
    }
}
