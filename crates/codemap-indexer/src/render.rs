//! Markdown rendering of the code index.
//!
//! Output is a pure function of the records and the tree: no timestamps,
//! no host-dependent separators, and every list in a fixed order.

use crate::extract::{ClassRecord, FunctionRecord};
use crate::scanner::{FileIndex, FileRecord};
use crate::tree::DirectoryTree;
use std::collections::BTreeSet;

/// Heading that marks the generated section.
pub const INDEX_HEADING: &str = "## Code Index";

const TREE_HEADING: &str = "### Directory Structure";
const CONFIG_HEADING: &str = "### Configuration Files";
const CODE_HEADING: &str = "### Project Code Files";

/// Render the generated section. The result ends with a single newline.
pub fn render(records: &FileIndex, tree: &DirectoryTree) -> String {
    let mut out: Vec<String> = Vec::new();

    out.push(INDEX_HEADING.to_string());
    out.push(String::new());

    out.push(TREE_HEADING.to_string());
    out.push(String::new());
    out.push("```".to_string());
    let rendered_tree = tree.render();
    if !rendered_tree.is_empty() {
        out.push(rendered_tree);
    }
    out.push("```".to_string());

    // FileIndex is keyed by relative path, so both groups come out sorted.
    let (manifests, sources): (Vec<&FileRecord>, Vec<&FileRecord>) =
        records.values().map(|r| r.as_ref()).partition(|r| r.is_manifest);

    if !manifests.is_empty() {
        out.push(String::new());
        out.push(CONFIG_HEADING.to_string());
        out.push(String::new());
        for record in manifests {
            out.push(match &record.description {
                Some(desc) => format!("- `{}` - {}", record.relative_path, desc),
                None => format!("- `{}`", record.relative_path),
            });
        }
    }

    if !sources.is_empty() {
        out.push(String::new());
        out.push(CODE_HEADING.to_string());
        for record in sources {
            out.push(String::new());
            render_file(&mut out, record);
        }
    }

    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn render_file(out: &mut Vec<String>, record: &FileRecord) {
    out.push(format!("#### `{}`", record.relative_path));

    if let Some(desc) = &record.description {
        out.push(String::new());
        out.push(format!("*{}*", desc));
    }

    if !record.classes.is_empty() {
        out.push(String::new());
        out.push("**Classes:**".to_string());
        out.extend(record.classes.iter().map(class_line));
    }

    if !record.functions.is_empty() {
        out.push(String::new());
        out.push("**Functions:**".to_string());
        out.extend(record.functions.iter().map(function_line));
    }

    if !record.imports.is_empty() {
        let imports: BTreeSet<&str> = record.imports.iter().map(String::as_str).collect();
        let joined = imports
            .iter()
            .map(|i| format!("`{}`", i))
            .collect::<Vec<_>>()
            .join(", ");
        out.push(String::new());
        out.push(format!("**Imports:** {}", joined));
    }
}

fn class_line(class: &ClassRecord) -> String {
    let bases = if class.base_types.is_empty() {
        String::new()
    } else {
        format!("({})", class.base_types.join(", "))
    };
    format!(
        "- `{}{}` {}{}",
        class.name,
        bases,
        line_range(class.start_line, class.end_line),
        doc_suffix(&class.doc_summary)
    )
}

fn function_line(function: &FunctionRecord) -> String {
    let tag = function
        .kind
        .tag()
        .map(|t| format!(" [{}]", t))
        .unwrap_or_default();
    format!(
        "- `{}({})`{} {}{}",
        function.name,
        function.parameters.join(", "),
        tag,
        line_range(function.start_line, function.end_line),
        doc_suffix(&function.doc_summary)
    )
}

/// `(line N)` when the end is unknown or equal to the start, else `(line N-M)`.
pub fn line_range(start: usize, end: Option<usize>) -> String {
    match end {
        Some(end) if end != start => format!("(line {}-{})", start, end),
        _ => format!("(line {})", start),
    }
}

fn doc_suffix(doc: &Option<String>) -> String {
    doc.as_ref().map(|d| format!(" - {}", d)).unwrap_or_default()
}
