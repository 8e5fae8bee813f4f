//! Line-oriented extraction for languages without a grammar.
//!
//! Every language gets a [`Rules`] table of anchored regexes. Lines are
//! scanned top to bottom while a nesting counter follows `{}` pairs (or
//! `end`-style keywords), which is what gives declarations an end line.
//! Declarations are only recognized outside function bodies, so nested
//! functions never show up as top-level entries.

use super::{comment_summary, ClassRecord, Extraction, FunctionKind, FunctionRecord, Language};
use regex::Regex;
use std::sync::LazyLock;

/// Parameter list shape, used to pick the name out of each parameter.
enum ParamStyle {
    /// `int count`, `String... args`, `$value`
    TypeThenName,
    /// `count: Int`, `_ label: String`
    NameThenType,
    /// `count`, `*args`, `ByRef value`
    Plain,
}

/// How bodies open and close.
enum Blocks {
    Braces,
    Keywords {
        /// Open a block only as the first word of a line
        line_openers: &'static [&'static str],
        /// Open a block anywhere on the line
        block_openers: &'static [&'static str],
        closers: &'static [&'static str],
    },
}

struct Rules {
    functions: Vec<(Regex, FunctionKind)>,
    classes: Vec<Regex>,
    imports: Vec<Regex>,
    comment_prefixes: &'static [&'static str],
    block_comment: Option<(&'static str, &'static str)>,
    quotes: &'static [char],
    /// `@Test` / `[Fact]` lines sit between docs and declarations
    annotations: bool,
    params: ParamStyle,
    blocks: Blocks,
    /// Functions whose body never opens are dropped (call sites look like declarations)
    require_body: bool,
}

/// Names that are never declarations.
const RESERVED_NAMES: &[&str] = &[
    "if", "else", "elif", "elsif", "for", "foreach", "while", "do", "switch", "case", "catch",
    "try", "finally", "return", "new", "delete", "throw", "sizeof", "typeof", "using", "lock",
    "when", "unless", "until", "default", "defined", "synchronized", "super", "this", "then",
    "loop", "not", "and", "or", "in",
];

/// Statement keywords that rule out a declaration when they lead the line.
const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "elsif", "for", "foreach", "while", "do", "switch", "catch", "try",
    "finally", "return", "throw", "delete", "unless", "until", "when",
];

/// Words skipped before looking for a line-leading block keyword.
const LEADING_MODIFIERS: &[&str] = &["private", "protected", "public", "module_function"];

const TEST_ANNOTATIONS: &[&str] = &[
    "Test",
    "Fact",
    "Theory",
    "TestMethod",
    "TestCase",
    "ParameterizedTest",
];

const PARAMS: &str = r"(?P<params>(?:[^()]|\([^()]*\))*)";

const C_COMMENTS: &[&str] = &["//"];
const HASH_COMMENTS: &[&str] = &["#"];
const C_BLOCK: Option<(&str, &str)> = Some(("/*", "*/"));
const BOTH_QUOTES: &[char] = &['"', '\''];

/// Compile a built-in pattern. Panics only on a malformed table entry.
fn re(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("%PARAMS%", PARAMS))
        .unwrap_or_else(|e| panic!("invalid built-in pattern {:?}: {}", pattern, e))
}

fn functions(rules: &[&str]) -> Vec<(Regex, FunctionKind)> {
    rules
        .iter()
        .map(|p| (re(p), FunctionKind::Function))
        .collect()
}

fn patterns(rules: &[&str]) -> Vec<Regex> {
    rules.iter().map(|p| re(p)).collect()
}

static C_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:[A-Za-z_]\w*[\s*]+)+(?P<name>[A-Za-z_]\w*)\s*\(%PARAMS%\)\s*(?:\{.*|;)?\s*$",
        // Objective-C methods
        r"^\s*[-+]\s*\([^)]*\)\s*(?P<name>\w+)",
    ]),
    classes: patterns(&[
        r"^\s*(?:typedef\s+)?struct\s+(?P<name>\w+)\s*\{?\s*$",
        r"^\s*(?:typedef\s+)?enum\s+(?P<name>\w+)\s*\{?\s*$",
        r"^\s*@(?:interface|protocol)\s+(?P<name>\w+)(?:\s*:\s*(?P<bases>\w+))?",
    ]),
    imports: patterns(&[
        r#"^\s*#\s*(?:include|import)\s*[<"](?P<module>[^>"]+)[>"]"#,
        r"^\s*@import\s+(?P<module>[\w.]+)",
    ]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::TypeThenName,
    blocks: Blocks::Braces,
    require_body: false,
});

static CPP_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:template\s*<[^>]*>\s*)?(?:[A-Za-z_][\w:<>,]*[\s*&]+)+(?P<name>~?[A-Za-z_][\w:]*)\s*\(%PARAMS%\)\s*(?:const\s*)?(?:noexcept\s*)?(?:override\s*)?(?:final\s*)?(?:->\s*[\w:<>*&\s]+?)?\s*(?:\{.*|;|=\s*(?:0|default|delete)\s*;)?\s*$",
        // Out-of-line constructors and destructors
        r"^\s*(?P<name>(?:[A-Za-z_]\w*::)+~?[A-Za-z_]\w*)\s*\(%PARAMS%\)\s*(?::.*|\{.*)?$",
    ]),
    classes: patterns(&[
        r"^\s*(?:template\s*<[^>]*>\s*)?(?:class|struct)\s+(?P<name>\w+)(?:\s+final)?\s*(?::\s*(?P<bases>[^{;]+?))?\s*\{?\s*$",
        r"^\s*(?:typedef\s+)?enum\s+(?:class\s+|struct\s+)?(?P<name>\w+)(?:\s*:\s*[\w:]+)?\s*\{?\s*$",
    ]),
    imports: patterns(&[r#"^\s*#\s*(?:include|import)\s*[<"](?P<module>[^>"]+)[>"]"#]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::TypeThenName,
    blocks: Blocks::Braces,
    require_body: false,
});

static JAVA_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default|strictfp)\s+)*(?:<[^>]+>\s+)?(?:[\w.$]+(?:<[^()]*?>)?(?:\[\])*\s+)?(?P<name>[A-Za-z_$][\w$]*)\s*\(%PARAMS%\)\s*(?:throws\s+[\w.,\s]+?)?\s*(?:\{.*|;)?\s*$",
    ]),
    classes: patterns(&[
        r"^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|protected|static|final|abstract|sealed|non-sealed|strictfp)\s+)*(?:class|interface|enum|record)\s+(?P<name>\w+)(?:\s*<[^{]*?>)?(?:\s*\([^)]*\))?(?P<bases>(?:\s+(?:extends|implements)\s+[^{]+?)?)\s*(?:permits\s+[^{]+?)?\s*\{?\s*$",
    ]),
    imports: patterns(&[r"^\s*import\s+(?:static\s+)?(?P<module>[\w.*]+)\s*;"]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: true,
    params: ParamStyle::TypeThenName,
    blocks: Blocks::Braces,
    require_body: false,
});

static CSHARP_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:\[[^\]]*\]\s*)*(?:(?:public|private|protected|internal|static|virtual|override|abstract|sealed|async|extern|unsafe|new|partial|readonly)\s+)*(?:[\w.\[\]?]+(?:<[^()]*?>)?[\[\]?]*\s+)?(?P<name>[A-Za-z_]\w*)\s*(?:<[^>]*>)?\s*\(%PARAMS%\)\s*(?::\s*(?:base|this)\s*\([^)]*\)\s*)?(?:where\s+[^{]+?)?\s*(?:\{.*|;|=>.*)?\s*$",
    ]),
    classes: patterns(&[
        r"^\s*(?:\[[^\]]*\]\s*)*(?:(?:public|private|protected|internal|static|abstract|sealed|partial|readonly|ref|unsafe|new|file)\s+)*(?:class|interface|struct|enum|record(?:\s+(?:class|struct))?)\s+(?P<name>\w+)(?:\s*<[^>]*>)?(?:\s*\([^)]*\))?(?:\s*:\s*(?P<bases>[^{]+?))?\s*(?:where\s+[^{]+?)?\s*\{?\s*;?\s*$",
    ]),
    imports: patterns(&[
        r"^\s*(?:global\s+)?using\s+(?:static\s+)?(?:\w+\s*=\s*)?(?P<module>[\w.]+)\s*;",
    ]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: true,
    params: ParamStyle::TypeThenName,
    blocks: Blocks::Braces,
    require_body: false,
});

static KOTLIN_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|protected|internal|open|override|abstract|final|suspend|inline|operator|infix|tailrec|external|actual|expect)\s+)*fun\s+(?:<[^>]+>\s*)?(?:[\w.<>?]+\.)?(?P<name>\w+)\s*\(%PARAMS%\)",
    ]),
    classes: patterns(&[
        r"^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|protected|internal|open|abstract|sealed|data|enum|annotation|inner|value|final)\s+)*(?:class|interface|object)\s+(?P<name>\w+)(?:\s*<[^{(]*?>)?(?:\s*(?:(?:private|internal|protected|public)\s+)?(?:constructor\s*)?\(%PARAMS%\))?(?:\s*:\s*(?P<bases>[^{]+?))?\s*\{?\s*$",
    ]),
    imports: patterns(&[r"^\s*import\s+(?P<module>[\w.*]+)"]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: true,
    params: ParamStyle::NameThenType,
    blocks: Blocks::Braces,
    require_body: false,
});

static SCALA_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:(?:private|protected|override|final|implicit|inline|lazy)(?:\[\w+\])?\s+)*def\s+(?P<name>[\w$]+)\s*(?:\[[^\]]*\])?\s*(?:\(%PARAMS%\))?",
    ]),
    classes: patterns(&[
        r"^\s*(?:(?:abstract|final|sealed|case|implicit|private|protected|open)\s+)*(?:class|trait|object|enum)\s+(?P<name>\w+)(?:\s*\[[^\]]*\])?(?:\s*\((?:[^()]|\([^()]*\))*\))?(?:\s+extends\s+(?P<bases>[^{:]+?))?\s*(?::|\{)?\s*$",
    ]),
    imports: patterns(&[r"^\s*import\s+(?P<module>[\w.]+)"]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: true,
    params: ParamStyle::NameThenType,
    blocks: Blocks::Braces,
    require_body: false,
});

static SWIFT_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|fileprivate|internal|open|static|class|final|override|mutating|nonmutating|convenience|required|dynamic|nonisolated)\s+)*func\s+(?P<name>\w+)\s*(?:<[^>]*>)?\s*\(%PARAMS%\)",
        r"^\s*(?:@\w+\s+)*(?:(?:public|private|fileprivate|internal|open|convenience|required|override)\s+)*(?P<name>init)\??\s*\(%PARAMS%\)",
    ]),
    classes: patterns(&[
        r"^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|fileprivate|internal|open|final|indirect)\s+)*(?:class|struct|enum|protocol|extension|actor)\s+(?P<name>[\w.]+)(?:\s*<[^{]*?>)?(?:\s*:\s*(?P<bases>[^{]+?))?\s*(?:where\s+[^{]+?)?\s*\{?\s*$",
    ]),
    imports: patterns(&[
        r"^\s*(?:@testable\s+)?import\s+(?:(?:class|struct|enum|protocol|func|var|typealias)\s+)?(?P<module>[\w.]+)",
    ]),
    comment_prefixes: C_COMMENTS,
    block_comment: C_BLOCK,
    quotes: &['"'],
    annotations: true,
    params: ParamStyle::NameThenType,
    blocks: Blocks::Braces,
    require_body: false,
});

static PHP_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:(?:public|private|protected|static|final|abstract)\s+)*function\s+&?(?P<name>\w+)\s*\(%PARAMS%\)",
    ]),
    classes: patterns(&[
        r"^\s*(?:(?:abstract|final|readonly)\s+)*(?:class|interface|trait|enum)\s+(?P<name>\w+)(?P<bases>(?:\s+(?:extends|implements)\s+[^{]+?)?)\s*\{?\s*$",
    ]),
    imports: patterns(&[
        r"^\s*use\s+(?P<module>[\w\\]+)",
        r#"^\s*(?:require|include)(?:_once)?\s*\(?\s*['"](?P<module>[^'"]+)['"]"#,
    ]),
    comment_prefixes: &["//", "#"],
    block_comment: C_BLOCK,
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::TypeThenName,
    blocks: Blocks::Braces,
    require_body: false,
});

static SHELL_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*function\s+(?P<name>[\w:.-]+)\s*(?:\(\s*\))?\s*\{?\s*$",
        r"^\s*(?P<name>[\w:.-]+)\s*\(\s*\)\s*\{?\s*$",
    ]),
    classes: Vec::new(),
    imports: patterns(&[r"^\s*(?:source|\.)\s+(?P<module>\S+)"]),
    comment_prefixes: HASH_COMMENTS,
    block_comment: None,
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::Plain,
    blocks: Blocks::Braces,
    require_body: false,
});

static R_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?P<name>[\w.]+)\s*(?:<-|<<-|=)\s*function\s*\(%PARAMS%\)",
    ]),
    classes: patterns(&[
        r#"^\s*setClass\s*\(\s*['"](?P<name>[\w.]+)['"]"#,
        r"^\s*(?P<name>[\w.]+)\s*(?:<-|=)\s*(?:R6Class|setRefClass)\s*\(",
    ]),
    imports: patterns(&[
        r#"^\s*(?:library|require|requireNamespace)\s*\(\s*['"]?(?P<module>[\w.]+)"#,
        r#"^\s*source\s*\(\s*['"](?P<module>[^'"]+)['"]"#,
    ]),
    comment_prefixes: HASH_COMMENTS,
    block_comment: None,
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::Plain,
    blocks: Blocks::Braces,
    require_body: false,
});

static AUTOHOTKEY_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: vec![
        (re(r"^\s*(?P<name>[^\s:;][^:]*?)::"), FunctionKind::Hotkey),
        (re(r"^\s*(?P<name>[\w-]+):\s*$"), FunctionKind::Label),
        (
            re(r"^\s*(?P<name>[A-Za-z_]\w*)\s*\(%PARAMS%\)\s*\{?\s*$"),
            FunctionKind::Function,
        ),
    ],
    classes: patterns(&[
        r"(?i)^\s*class\s+(?P<name>\w+)(?:\s+extends\s+(?P<bases>[\w.]+))?\s*\{?\s*$",
    ]),
    imports: patterns(&[
        r"(?i)^\s*#Include(?:Again)?\s+(?:\*i\s+)?<?(?P<module>[^>\s;]+)>?",
    ]),
    comment_prefixes: &[";"],
    block_comment: C_BLOCK,
    quotes: &['"'],
    annotations: false,
    params: ParamStyle::Plain,
    blocks: Blocks::Braces,
    require_body: true,
});

static RUBY_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:(?:private|protected|public|module_function)\s+)?def\s+(?:self\.)?(?P<name>\w+[?!=]?|\[\]=?|[-+*/<>=!~%&|^]+)(?:\s*\(%PARAMS%\)|\s+(?P<bare>[^\s;#=][^;#]*))?",
    ]),
    classes: patterns(&[r"^\s*(?:class|module)\s+(?P<name>[\w:]+)(?:\s*<\s*(?P<bases>[\w:]+))?"]),
    imports: patterns(&[
        r#"^\s*(?:require|require_relative|load)\s*\(?\s*['"](?P<module>[^'"]+)['"]"#,
    ]),
    comment_prefixes: HASH_COMMENTS,
    block_comment: Some(("=begin", "=end")),
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::Plain,
    blocks: Blocks::Keywords {
        line_openers: &[
            "def", "class", "module", "if", "unless", "while", "until", "case", "begin", "for",
        ],
        block_openers: &["do"],
        closers: &["end"],
    },
    require_body: false,
});

static LUA_RULES: LazyLock<Rules> = LazyLock::new(|| Rules {
    functions: functions(&[
        r"^\s*(?:local\s+)?function\s+(?P<name>[\w.:]+)\s*\(%PARAMS%\)",
        r"^\s*(?:local\s+)?(?P<name>[\w.]+)\s*=\s*function\s*\(%PARAMS%\)",
    ]),
    classes: Vec::new(),
    // Unanchored: requires show up mid-line in assignments
    imports: patterns(&[r#"require\s*\(?\s*['"](?P<module>[^'"]+)['"]"#]),
    comment_prefixes: &["--"],
    block_comment: Some(("--[[", "]]")),
    quotes: BOTH_QUOTES,
    annotations: false,
    params: ParamStyle::Plain,
    blocks: Blocks::Keywords {
        line_openers: &[],
        block_openers: &["function", "do", "if", "repeat"],
        closers: &["end", "until"],
    },
    require_body: false,
});

static BASE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| re(r"\b(?:extends|implements|with)\b"));

fn rules_for(language: Language) -> Option<&'static Rules> {
    let rules: &'static Rules = match language {
        Language::C => &*C_RULES,
        Language::Cpp => &*CPP_RULES,
        Language::Java => &*JAVA_RULES,
        Language::CSharp => &*CSHARP_RULES,
        Language::Kotlin => &*KOTLIN_RULES,
        Language::Scala => &*SCALA_RULES,
        Language::Swift => &*SWIFT_RULES,
        Language::Php => &*PHP_RULES,
        Language::Shell => &*SHELL_RULES,
        Language::R => &*R_RULES,
        Language::AutoHotkey => &*AUTOHOTKEY_RULES,
        Language::Ruby => &*RUBY_RULES,
        Language::Lua => &*LUA_RULES,
        Language::Python
        | Language::Rust
        | Language::Go
        | Language::TypeScript
        | Language::JavaScript => return None,
    };
    Some(rules)
}

/// Extract declarations from `content` line by line.
pub(super) fn extract(content: &str, language: Language) -> Extraction {
    let Some(rules) = rules_for(language) else {
        return Extraction::default();
    };

    let lines: Vec<&str> = content.lines().collect();
    let comments = comment_mask(&lines, rules);
    let mut walker = LineWalker::new(rules);

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || comments[idx] {
            continue;
        }

        walker.settle_pending(idx, trimmed);
        walker.collect_imports(line);
        if !walker.inside_function() {
            walker.match_declaration(idx, &lines, &comments);
        }
        for event in block_events(line, rules) {
            walker.apply(event, idx + 1);
        }
    }

    walker.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEvent {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Function(usize),
    Class(usize),
}

/// A declaration waiting for its body to open or close.
#[derive(Debug)]
struct Entry {
    target: Target,
    /// Nesting depth at the declaration line
    base_depth: usize,
    opened: bool,
    /// 0-based line of the declaration
    decl_line: usize,
}

struct LineWalker {
    rules: &'static Rules,
    depth: usize,
    stack: Vec<Entry>,
    // Slots are cleared when a bodiless function is dropped
    functions: Vec<Option<FunctionRecord>>,
    classes: Vec<ClassRecord>,
    imports: Vec<String>,
}

impl LineWalker {
    fn new(rules: &'static Rules) -> Self {
        Self {
            rules,
            depth: 0,
            stack: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
        }
    }

    fn inside_function(&self) -> bool {
        self.stack
            .iter()
            .any(|e| e.opened && matches!(e.target, Target::Function(_)))
    }

    /// Resolve declarations from earlier lines that have not opened a body.
    ///
    /// A brace body may start on the following line; anything else means
    /// the declaration has no body we can follow.
    fn settle_pending(&mut self, idx: usize, trimmed: &str) {
        let body_follows = matches!(self.rules.blocks, Blocks::Braces) && trimmed.starts_with('{');

        while let Some(top) = self.stack.last() {
            if top.opened || top.decl_line >= idx || body_follows {
                break;
            }
            if let Some(entry) = self.stack.pop() {
                self.abandon(entry);
            }
        }
    }

    fn collect_imports(&mut self, line: &str) {
        let rules = self.rules;
        for regex in &rules.imports {
            for caps in regex.captures_iter(line) {
                if let Some(module) = caps.name("module") {
                    let module = module.as_str().trim().trim_end_matches('.');
                    if !module.is_empty() {
                        self.imports.push(module.to_string());
                    }
                }
            }
        }
    }

    fn match_declaration(&mut self, idx: usize, lines: &[&str], comments: &[bool]) {
        let rules = self.rules;
        let line = lines[idx];
        let trimmed = line.trim();
        let leading = leading_word(trimmed).to_lowercase();
        if STATEMENT_KEYWORDS.contains(&leading.as_str()) {
            return;
        }

        let ends_statement = matches!(rules.blocks, Blocks::Braces)
            && trimmed.ends_with(';')
            && !trimmed.contains('{');
        let end_line = ends_statement.then_some(idx + 1);

        for regex in &rules.classes {
            let Some(caps) = regex.captures(line) else {
                continue;
            };
            let Some(name) = caps.name("name").map(|m| m.as_str()) else {
                continue;
            };
            if is_reserved(name) {
                continue;
            }

            let base_types = caps
                .name("bases")
                .map(|m| parse_bases(m.as_str()))
                .unwrap_or_default();
            let (doc_summary, _) = docs_above(idx, lines, comments, rules);

            let index = self.classes.len();
            self.classes.push(ClassRecord {
                name: name.to_string(),
                start_line: idx + 1,
                end_line,
                base_types,
                doc_summary,
            });
            if !ends_statement {
                self.push_entry(Target::Class(index), idx);
            }
            return;
        }

        for (regex, kind) in &rules.functions {
            let Some(caps) = regex.captures(line) else {
                continue;
            };
            let Some(name) = caps.name("name").map(|m| m.as_str().trim()) else {
                continue;
            };
            if name.is_empty() || is_reserved(name) {
                continue;
            }

            let parameters = caps
                .name("params")
                .or_else(|| caps.name("bare"))
                .map(|m| parse_params(m.as_str(), &rules.params))
                .unwrap_or_default();
            let (doc_summary, test_annotation) = docs_above(idx, lines, comments, rules);

            let kind = match kind {
                FunctionKind::Function if test_annotation || is_test_name(name) => {
                    FunctionKind::Test
                }
                other => *other,
            };

            let index = self.functions.len();
            self.functions.push(Some(FunctionRecord {
                name: name.to_string(),
                start_line: idx + 1,
                end_line,
                parameters,
                doc_summary,
                kind,
            }));
            if !ends_statement {
                self.push_entry(Target::Function(index), idx);
            }
            return;
        }
    }

    fn push_entry(&mut self, target: Target, decl_line: usize) {
        self.stack.push(Entry {
            target,
            base_depth: self.depth,
            opened: false,
            decl_line,
        });
    }

    fn apply(&mut self, event: BlockEvent, line_no: usize) {
        match event {
            BlockEvent::Open => {
                self.depth += 1;
                if let Some(top) = self.stack.last_mut() {
                    if !top.opened && self.depth == top.base_depth + 1 {
                        top.opened = true;
                    }
                }
            }
            BlockEvent::Close => {
                while self.stack.last().is_some_and(|e| !e.opened) {
                    if let Some(entry) = self.stack.pop() {
                        self.abandon(entry);
                    }
                }

                self.depth = self.depth.saturating_sub(1);

                while self
                    .stack
                    .last()
                    .is_some_and(|e| e.opened && self.depth <= e.base_depth)
                {
                    if let Some(entry) = self.stack.pop() {
                        self.close(entry, line_no);
                    }
                }
            }
        }
    }

    fn close(&mut self, entry: Entry, line_no: usize) {
        match entry.target {
            Target::Function(i) => {
                if let Some(Some(record)) = self.functions.get_mut(i) {
                    record.end_line = Some(line_no);
                }
            }
            Target::Class(i) => {
                if let Some(record) = self.classes.get_mut(i) {
                    record.end_line = Some(line_no);
                }
            }
        }
    }

    /// A declaration whose body never opened keeps an unknown end line.
    fn abandon(&mut self, entry: Entry) {
        if !self.rules.require_body {
            return;
        }
        if let Target::Function(i) = entry.target {
            if let Some(slot) = self.functions.get_mut(i) {
                if slot.as_ref().is_some_and(|f| f.kind == FunctionKind::Function) {
                    *slot = None;
                }
            }
        }
    }

    fn finish(mut self) -> Extraction {
        // Bodies still open at end of file keep an unknown end line
        while let Some(entry) = self.stack.pop() {
            if !entry.opened {
                self.abandon(entry);
            }
        }

        Extraction {
            functions: self.functions.into_iter().flatten().collect(),
            classes: self.classes,
            imports: self.imports,
        }
    }
}

/// Mark every line that is entirely comment.
fn comment_mask(lines: &[&str], rules: &Rules) -> Vec<bool> {
    let mut mask = Vec::with_capacity(lines.len());
    let mut in_block = false;

    for line in lines {
        let trimmed = line.trim();
        let is_comment = if in_block {
            if let Some((_, close)) = rules.block_comment {
                in_block = !trimmed.contains(close);
            }
            true
        } else if let Some((open, close)) = rules
            .block_comment
            .filter(|(open, _)| trimmed.starts_with(*open))
        {
            in_block = !trimmed[open.len()..].contains(close);
            true
        } else {
            rules.comment_prefixes.iter().any(|p| trimmed.starts_with(p))
        };
        mask.push(is_comment);
    }

    mask
}

/// Summary of the comment block directly above line `idx`, and whether a
/// test annotation sits between it and the declaration.
fn docs_above(
    idx: usize,
    lines: &[&str],
    comments: &[bool],
    rules: &Rules,
) -> (Option<String>, bool) {
    let mut docs = Vec::new();
    let mut is_test = false;

    for i in (0..idx).rev() {
        let trimmed = lines[i].trim();
        if comments[i] && !trimmed.starts_with("#!") {
            docs.push(trimmed);
        } else if rules.annotations && is_annotation(trimmed) {
            is_test |= is_test_annotation(trimmed);
        } else {
            break;
        }
    }

    docs.reverse();
    (comment_summary(&docs.join("\n")), is_test)
}

fn is_annotation(line: &str) -> bool {
    line.starts_with('@') || (line.starts_with('[') && line.ends_with(']'))
}

fn is_test_annotation(line: &str) -> bool {
    let name = line
        .trim_start_matches(['@', '['])
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .next()
        .unwrap_or_default();
    let last = name.rsplit('.').next().unwrap_or(name);
    TEST_ANNOTATIONS.contains(&last)
}

fn is_test_name(name: &str) -> bool {
    name.starts_with("test_")
        || (name.starts_with("test") && name[4..].starts_with(|c: char| c.is_ascii_uppercase()))
}

fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name.to_lowercase().as_str())
}

fn leading_word(trimmed: &str) -> &str {
    let end = trimmed
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

/// Nesting changes on one line, in order.
fn block_events(line: &str, rules: &Rules) -> Vec<BlockEvent> {
    let code = code_portion(line, rules);

    match &rules.blocks {
        Blocks::Braces => code
            .chars()
            .filter_map(|c| match c {
                '{' => Some(BlockEvent::Open),
                '}' => Some(BlockEvent::Close),
                _ => None,
            })
            .collect(),
        Blocks::Keywords {
            line_openers,
            block_openers,
            closers,
        } => {
            let mut events = Vec::new();
            let mut line_opened = false;
            let mut first = true;

            for word in keywords_in(&code) {
                if first && LEADING_MODIFIERS.contains(&word) {
                    continue;
                }
                let is_first = std::mem::replace(&mut first, false);

                if is_first && line_openers.contains(&word) {
                    events.push(BlockEvent::Open);
                    line_opened = true;
                } else if !line_opened && block_openers.contains(&word) {
                    events.push(BlockEvent::Open);
                } else if closers.contains(&word) {
                    events.push(BlockEvent::Close);
                }
            }

            events
        }
    }
}

/// The line with string literals blanked out and any trailing comment removed.
fn code_portion(line: &str, rules: &Rules) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            out.push(' ');
            continue;
        }

        if rules.quotes.contains(&c) {
            quote = Some(c);
            out.push(' ');
            continue;
        }

        let at_boundary = i == 0 || line[..i].ends_with(char::is_whitespace);
        if at_boundary && starts_comment(&line[i..], rules) {
            break;
        }
        out.push(c);
    }

    out
}

fn starts_comment(rest: &str, rules: &Rules) -> bool {
    rules.comment_prefixes.iter().any(|p| rest.starts_with(p))
        || rules
            .block_comment
            .is_some_and(|(open, _)| rest.starts_with(open))
}

/// Bare words on a line, skipping member accesses, symbols and hash keys.
fn keywords_in(code: &str) -> Vec<&str> {
    let bytes = code.as_bytes();
    let mut words = Vec::new();
    let mut start = None;

    for i in 0..=bytes.len() {
        let is_word = i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_');
        match (start, is_word) {
            (None, true) => start = Some(i),
            (Some(s), false) => {
                let prev = s.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i).copied();
                let member = matches!(prev, Some(b'.' | b':' | b'@' | b'$'))
                    || (next == Some(b':') && bytes.get(i + 1) != Some(&b':'));
                if !member {
                    words.push(&code[s..i]);
                }
                start = None;
            }
            _ => {}
        }
    }

    words
}

/// Split on commas that are not nested in brackets or quotes.
fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<char> = None;

    for (i, c) in raw.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(raw[start..].trim());

    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_params(raw: &str, style: &ParamStyle) -> Vec<String> {
    split_top_level(raw)
        .into_iter()
        .filter_map(|piece| param_name(piece, style))
        .collect()
}

fn param_name(piece: &str, style: &ParamStyle) -> Option<String> {
    // Drop default values (`x = 1`, `y := 2`)
    let piece = piece
        .split('=')
        .next()
        .unwrap_or(piece)
        .trim()
        .trim_end_matches(':')
        .trim();

    let name = match style {
        ParamStyle::TypeThenName => {
            let tokens: Vec<&str> = piece.split_whitespace().collect();
            let last = *tokens.last()?;
            let sigil = last.trim_start_matches(['&', '.']).starts_with('$');
            if tokens.len() < 2 && !sigil {
                return None;
            }
            last.trim_start_matches(['*', '&', '.'])
                .split('[')
                .next()
                .unwrap_or_default()
        }
        ParamStyle::NameThenType => {
            let head = piece.split(':').next().unwrap_or(piece);
            head.split_whitespace().last()?
        }
        ParamStyle::Plain => piece
            .split_whitespace()
            .last()?
            .trim_start_matches(['*', '&'])
            .trim_end_matches('*'),
    };

    let valid = name == "..."
        || name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$');
    valid.then(|| name.to_string())
}

fn parse_bases(raw: &str) -> Vec<String> {
    let normalized = BASE_KEYWORDS.replace_all(raw, ",");

    split_top_level(&normalized)
        .into_iter()
        .filter_map(|piece| {
            let piece = piece.trim_start_matches(':').trim();
            let words: Vec<&str> = piece
                .split_whitespace()
                .filter(|w| !matches!(*w, "public" | "private" | "protected" | "virtual" | "internal"))
                .collect();
            let joined = words.join(" ");
            let name = joined.split(['(', '{']).next().unwrap_or_default().trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}
