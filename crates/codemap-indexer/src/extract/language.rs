//! Language detection for source files.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Languages the structure extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Rust,
    Go,
    TypeScript,
    JavaScript,
    C,
    Cpp,
    CSharp,
    Java,
    Kotlin,
    Scala,
    Swift,
    Php,
    Shell,
    R,
    AutoHotkey,
    Ruby,
    Lua,
}

impl Language {
    /// Get the display name for this language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Rust => "Rust",
            Language::Go => "Go",
            Language::TypeScript => "TypeScript",
            Language::JavaScript => "JavaScript",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::Scala => "Scala",
            Language::Swift => "Swift",
            Language::Php => "PHP",
            Language::Shell => "Shell",
            Language::R => "R",
            Language::AutoHotkey => "AutoHotkey",
            Language::Ruby => "Ruby",
            Language::Lua => "Lua",
        }
    }

    /// Check if this language is extracted from a tree-sitter syntax tree.
    pub fn has_parser(&self) -> bool {
        matches!(
            self,
            Language::Rust
                | Language::TypeScript
                | Language::JavaScript
                | Language::Python
                | Language::Go
        )
    }
}

/// Detect the language of a file based on its extension.
pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = path.extension()?.to_str()?.to_lowercase();

    match ext.as_str() {
        "py" | "pyi" | "pyw" => Some(Language::Python),
        "rs" => Some(Language::Rust),
        "go" => Some(Language::Go),

        // JSX-capable sources go through the TSX grammar
        "ts" | "mts" | "cts" => Some(Language::TypeScript),
        "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),

        "c" | "h" | "m" => Some(Language::C),
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" | "mm" => Some(Language::Cpp),
        "cs" => Some(Language::CSharp),
        "java" => Some(Language::Java),
        "kt" | "kts" => Some(Language::Kotlin),
        "scala" | "sc" => Some(Language::Scala),
        "swift" => Some(Language::Swift),
        "php" => Some(Language::Php),
        "sh" | "bash" | "zsh" => Some(Language::Shell),
        "r" => Some(Language::R),
        "ahk" => Some(Language::AutoHotkey),
        "rb" | "rake" => Some(Language::Ruby),
        "lua" => Some(Language::Lua),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_detect_parsed_languages() {
        assert_eq!(
            detect_language(&PathBuf::from("main.rs")),
            Some(Language::Rust)
        );
        assert_eq!(
            detect_language(&PathBuf::from("app.py")),
            Some(Language::Python)
        );
        assert_eq!(
            detect_language(&PathBuf::from("main.go")),
            Some(Language::Go)
        );
    }

    #[test]
    fn test_detect_typescript_and_javascript() {
        assert_eq!(
            detect_language(&PathBuf::from("index.ts")),
            Some(Language::TypeScript)
        );
        assert_eq!(
            detect_language(&PathBuf::from("App.tsx")),
            Some(Language::JavaScript)
        );
        assert_eq!(
            detect_language(&PathBuf::from("module.mjs")),
            Some(Language::JavaScript)
        );
    }

    #[test]
    fn test_detect_pattern_languages() {
        assert_eq!(detect_language(&PathBuf::from("a.java")), Some(Language::Java));
        assert_eq!(detect_language(&PathBuf::from("a.hpp")), Some(Language::Cpp));
        assert_eq!(detect_language(&PathBuf::from("a.rb")), Some(Language::Ruby));
        assert_eq!(
            detect_language(&PathBuf::from("hotkeys.ahk")),
            Some(Language::AutoHotkey)
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_language(&PathBuf::from("file.xyz")), None);
        assert_eq!(detect_language(&PathBuf::from("Makefile")), None);
        assert_eq!(detect_language(&PathBuf::from("package.json")), None);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            detect_language(&PathBuf::from("main.RS")),
            Some(Language::Rust)
        );
        assert_eq!(
            detect_language(&PathBuf::from("index.TS")),
            Some(Language::TypeScript)
        );
    }

    #[test]
    fn test_has_parser() {
        assert!(Language::Rust.has_parser());
        assert!(Language::Python.has_parser());
        assert!(Language::JavaScript.has_parser());
        assert!(!Language::Java.has_parser());
        assert!(!Language::Ruby.has_parser());
    }
}
