//! Structural extraction from source text.
//!
//! Turns raw file content into flat lists of functions, classes and imports.
//! Languages with a tree-sitter grammar get exact declaration boundaries;
//! everything else goes through line-oriented pattern matching with a
//! nesting counter. Both paths sit behind [`extract`], so moving a language
//! from one strategy to the other is a local change.
//!
//! Extraction never fails: malformed input produces empty or partial results.

mod language;
mod patterns;
mod syntax;

pub use language::{detect_language, Language};

use serde::{Deserialize, Serialize};

/// Kind tag for a function-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    Function,
    Test,
    Label,
    Hotkey,
}

impl FunctionKind {
    /// Short tag shown next to non-plain functions in the rendered index.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            FunctionKind::Function => None,
            FunctionKind::Test => Some("test"),
            FunctionKind::Label => Some("label"),
            FunctionKind::Hotkey => Some("hotkey"),
        }
    }
}

/// A function, method, label or hotkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    /// Start line (1-indexed)
    pub start_line: usize,
    /// End line (1-indexed), absent when boundaries are unknown
    pub end_line: Option<usize>,
    pub parameters: Vec<String>,
    /// First line of the attached documentation
    pub doc_summary: Option<String>,
    pub kind: FunctionKind,
}

/// A class, struct, trait, interface or similar type declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub start_line: usize,
    pub end_line: Option<usize>,
    pub base_types: Vec<String>,
    pub doc_summary: Option<String>,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub functions: Vec<FunctionRecord>,
    pub classes: Vec<ClassRecord>,
    /// Import targets in source order, duplicates kept
    pub imports: Vec<String>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.classes.is_empty() && self.imports.is_empty()
    }
}

/// Extract functions, classes and imports from `content`.
pub fn extract(content: &str, language: Language) -> Extraction {
    if content.trim().is_empty() {
        return Extraction::default();
    }

    if language.has_parser() {
        syntax::extract(content, language)
    } else {
        patterns::extract(content, language)
    }
}

/// First meaningful line of a comment block, with comment markers removed.
pub(crate) fn comment_summary(raw: &str) -> Option<String> {
    raw.lines()
        .map(clean_comment_line)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn clean_comment_line(line: &str) -> &str {
    let mut line = line.trim();
    line = line.strip_suffix("*/").unwrap_or(line).trim_end();

    for prefix in ["///", "//!", "//", "/**", "/*", "---", "--", "#", ";", "*"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            line = rest;
            break;
        }
    }

    line.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content() {
        assert!(extract("", Language::Python).is_empty());
        assert!(extract("   \n\n", Language::Java).is_empty());
    }

    #[test]
    fn test_comment_summary_strips_markers() {
        assert_eq!(
            comment_summary("/**\n * Adds numbers.\n * More text.\n */").as_deref(),
            Some("Adds numbers.")
        );
        assert_eq!(comment_summary("/// Entry point").as_deref(), Some("Entry point"));
        assert_eq!(comment_summary("# Ruby comment").as_deref(), Some("Ruby comment"));
        assert_eq!(comment_summary("-- Lua comment").as_deref(), Some("Lua comment"));
        assert_eq!(comment_summary("/* one line */").as_deref(), Some("one line"));
        assert_eq!(comment_summary("//\n//"), None);
    }

    #[test]
    fn test_function_kind_tags() {
        assert_eq!(FunctionKind::Function.tag(), None);
        assert_eq!(FunctionKind::Test.tag(), Some("test"));
        assert_eq!(FunctionKind::Hotkey.tag(), Some("hotkey"));
    }
}
