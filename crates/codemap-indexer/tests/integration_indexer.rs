//! Integration tests for the codemap scan, render and merge pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

use codemap_indexer::{
    merge, FunctionKind, IndexSettings, ProjectConfig, ProjectIndexer, UpdateOutcome,
};

const GREETER: &str = r#"def hello():
    """Say hello."""
    print("hello")


class Greeter:
    """A greeting class."""

    def greet(self):
        return "hi"
"#;

fn python_indexer(root: &Path) -> ProjectIndexer {
    let config = ProjectConfig::new(root).with_extensions([".py", ".rs"]);
    ProjectIndexer::new(config, IndexSettings::default())
}

/// Helper to create a small mixed project
fn create_test_project(base: &Path) -> PathBuf {
    let project = base.join("test_project");
    fs::create_dir_all(project.join("src")).unwrap();

    fs::write(
        project.join("Cargo.toml"),
        "# Example crate\n[package]\nname = \"test\"\n",
    )
    .unwrap();
    fs::write(
        project.join("src/lib.rs"),
        r#"//! Library root

/// Adds two numbers.
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        assert_eq!(add(2, 2), 4);
    }
}
"#,
    )
    .unwrap();
    fs::write(project.join("README.md"), "# Readme\n").unwrap();

    project
}

/// Scenario A: one Python file with a function and a class with a method
#[test]
fn test_python_file_structure() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("test.py"), GREETER).unwrap();

    let mut indexer = python_indexer(temp_dir.path());
    let index = indexer.scan().unwrap();

    assert_eq!(index.len(), 1);
    let record = &index["test.py"];

    let names: Vec<_> = record.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["hello", "greet"]);
    assert_eq!(record.functions[0].doc_summary.as_deref(), Some("Say hello."));

    assert_eq!(record.classes.len(), 1);
    assert_eq!(record.classes[0].name, "Greeter");
    assert_eq!(
        record.classes[0].doc_summary.as_deref(),
        Some("A greeting class.")
    );
}

/// Scenario B: an empty directory
#[test]
fn test_empty_directory() {
    let temp_dir = tempdir().unwrap();
    let mut indexer = python_indexer(temp_dir.path());

    assert!(indexer.scan().unwrap().is_empty());
    let tree = indexer.build_tree().unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.render(), "");
}

/// Scenario C: two regenerations without changes leave the document alone
#[test]
fn test_regeneration_is_stable_and_keeps_user_content() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());

    let doc = project.join("CLAUDE.md");
    fs::write(
        &doc,
        "# Project Notes\n\nHand-written intro.\n\n## Conventions\n\nUse tabs.\n",
    )
    .unwrap();

    let mut indexer = python_indexer(&project);
    let first = indexer.update_index().unwrap();
    assert!(first.was_written());
    let after_first = fs::read_to_string(&doc).unwrap();

    let second = indexer.update_index().unwrap();
    assert_eq!(second, UpdateOutcome::Unchanged { path: indexer.output_path() });
    let after_second = fs::read_to_string(&doc).unwrap();

    assert_eq!(after_first, after_second);
    assert!(after_first.starts_with("# Project Notes\n"));
    assert!(after_first.contains("Hand-written intro.\n"));
    assert!(after_first.contains("## Conventions\n\nUse tabs.\n"));
    assert!(after_first.contains("## Code Index\n"));
}

/// Test full pipeline output for a mixed project
#[test]
fn test_generated_index_content() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());

    let mut indexer = python_indexer(&project);
    let text = indexer.generate_index().unwrap();

    assert!(text.contains("├── Cargo.toml\n├── README.md\n└── src/\n    └── lib.rs\n"));
    assert!(text.contains("### Configuration Files\n\n- `Cargo.toml` - Example crate\n"));
    assert!(text.contains("#### `src/lib.rs`\n\n*Library root*\n"));
    assert!(text.contains("- `add(a, b)` (line 4-6) - Adds two numbers.\n"));
    assert!(text.contains("- `test_add()` [test] (line 13-15)\n"));
    assert!(!text.contains("`README.md`"));

    let index = indexer.scan().unwrap();
    let kinds: Vec<_> = index["src/lib.rs"].functions.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, vec![FunctionKind::Function, FunctionKind::Test]);
}

/// Cache correctness: unchanged files keep their record, changed files are re-extracted
#[test]
fn test_cache_reuse_across_scans() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("stable.py"), GREETER).unwrap();
    fs::write(temp_dir.path().join("edited.py"), "def f():\n    pass\n").unwrap();

    let mut indexer = python_indexer(temp_dir.path());
    let first = indexer.scan().unwrap();

    fs::write(temp_dir.path().join("edited.py"), "def f():\n    pass\n\n").unwrap();
    let second = indexer.scan().unwrap();

    assert!(Arc::ptr_eq(&first["stable.py"], &second["stable.py"]));
    assert!(!Arc::ptr_eq(&first["edited.py"], &second["edited.py"]));
    assert_ne!(
        first["edited.py"].content_hash,
        second["edited.py"].content_hash
    );
}

/// Ignore precedence: configured suffix patterns and .gitignore directories
#[test]
fn test_ignore_precedence() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    fs::write(root.join(".gitignore"), "build/\n").unwrap();
    fs::create_dir_all(root.join("build/lib")).unwrap();
    fs::write(root.join("build/lib/generated.py"), "def g(): pass\n").unwrap();
    fs::write(root.join("main.py"), "def main(): pass\n").unwrap();
    fs::write(root.join("main.pyc"), "").unwrap();

    let mut config = ProjectConfig::new(root).with_extensions([".py", ".pyc"]);
    config.ignore_patterns = vec!["*.pyc".to_string()];
    let mut indexer = ProjectIndexer::new(config, IndexSettings::default());

    let index = indexer.scan().unwrap();
    let keys: Vec<_> = index.keys().map(String::as_str).collect();
    assert_eq!(keys, vec![".gitignore", "main.py"]);

    let tree = indexer.build_tree().unwrap();
    assert!(tree.find("build").is_none());
    assert!(tree.find("main.pyc").is_none());
    assert!(indexer.resolver().should_ignore(&root.join("build/lib/generated.py")));
}

/// Depth limiting applies to both the index and the rendered tree
#[test]
fn test_depth_limit() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path();

    fs::create_dir_all(root.join("a/b")).unwrap();
    fs::write(root.join("top.py"), "").unwrap();
    fs::write(root.join("a/inside.py"), "").unwrap();
    fs::write(root.join("a/b/deep.py"), "").unwrap();

    let mut config = ProjectConfig::new(root).with_extensions([".py"]);
    config.max_depth = 1;
    let mut indexer = ProjectIndexer::new(config, IndexSettings::default());

    let index = indexer.scan().unwrap();
    let keys: Vec<_> = index.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a/inside.py", "top.py"]);

    let tree = indexer.build_tree().unwrap();
    assert!(tree.find("a/inside.py").is_some());
    assert!(tree.find("a/b/deep.py").is_none());
}

/// The generated section can be merged into an arbitrary document twice
#[test]
fn test_merge_idempotent_with_generated_index() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let mut indexer = python_indexer(&project);
    let rendered = indexer.generate_index().unwrap();

    let doc = "# Title\n\n```\n## Code Index\n```\n\n## Later\n\ntext\n";
    let once = merge(doc, &rendered);
    assert_eq!(merge(&once, &rendered), once);
}

/// Files that disappear are dropped from the next index
#[test]
fn test_deleted_file_removed_from_index() {
    let temp_dir = tempdir().unwrap();
    let project = create_test_project(temp_dir.path());
    let mut indexer = python_indexer(&project);

    indexer.update_index().unwrap();
    fs::remove_file(project.join("src/lib.rs")).unwrap();
    indexer.update_index().unwrap();

    let doc = fs::read_to_string(project.join("CLAUDE.md")).unwrap();
    assert!(!doc.contains("lib.rs"));
    assert!(doc.contains("`Cargo.toml`"));
}

/// Test scan handles symlinks gracefully
#[test]
#[cfg(unix)]
fn test_scan_handles_symlinks() {
    use std::os::unix::fs::symlink;

    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("symlink_test");
    fs::create_dir_all(&project).unwrap();

    fs::write(project.join("real.py"), "def real(): pass\n").unwrap();
    symlink(project.join("real.py"), project.join("link.py")).unwrap();
    symlink(temp_dir.path(), project.join("loop")).unwrap();

    let mut indexer = python_indexer(&project);
    assert!(indexer.scan().is_ok());
    assert!(indexer.update_index().is_ok());
}

/// Symlinks resolving outside the project are neither indexed nor listed
#[test]
#[cfg(unix)]
fn test_scan_excludes_symlinks_outside_root() {
    use std::os::unix::fs::symlink;

    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("project");
    let outside = temp_dir.path().join("outside");
    fs::create_dir_all(&project).unwrap();
    fs::create_dir_all(outside.join("pkg")).unwrap();

    fs::write(project.join("main.py"), "def main(): pass\n").unwrap();
    fs::write(outside.join("secret.py"), "def leaked(): pass\n").unwrap();
    fs::write(outside.join("pkg/mod.py"), "def hidden(): pass\n").unwrap();
    symlink(Path::new("../outside/secret.py"), project.join("link.py")).unwrap();
    symlink(outside.join("pkg"), project.join("pkg")).unwrap();

    let mut indexer = python_indexer(&project);
    assert!(indexer.resolver().should_ignore(&project.join("link.py")));

    let index = indexer.scan().unwrap();
    assert_eq!(index.keys().collect::<Vec<_>>(), vec!["main.py"]);

    let tree = indexer.build_tree().unwrap();
    assert!(tree.find("link.py").is_none());
    assert!(tree.find("pkg").is_none());

    let content = indexer.generate_index().unwrap();
    assert!(!content.contains("leaked"));
    assert!(!content.contains("link.py"));
}

/// Test scan performance on medium project
#[test]
fn test_scan_performance_medium_project() {
    let temp_dir = tempdir().unwrap();
    let project = temp_dir.path().join("perf_test");

    // Create 100 files across 10 directories
    for i in 0..10 {
        let dir = project.join(format!("module_{}", i));
        fs::create_dir_all(&dir).unwrap();

        for j in 0..10 {
            fs::write(
                dir.join(format!("file_{}.rs", j)),
                format!("pub fn func_{}() {{ }}\n", j),
            )
            .unwrap();
        }
    }

    let mut indexer = python_indexer(&project);
    let start = std::time::Instant::now();
    let index = indexer.scan().unwrap();
    let elapsed = start.elapsed();

    assert_eq!(index.len(), 100);
    assert!(elapsed.as_secs() < 5, "Scan took too long: {:?}", elapsed);
}
