//! Grammar-based extraction with tree-sitter.

use super::{comment_summary, ClassRecord, Extraction, FunctionKind, FunctionRecord, Language};
use tracing::debug;
use tree_sitter::{Node, Parser};

/// Parse `content` and collect module- and class-level declarations.
///
/// A tree containing syntax errors yields an empty extraction.
pub(super) fn extract(content: &str, language: Language) -> Extraction {
    let grammar: tree_sitter::Language = match language {
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::JavaScript => tree_sitter_typescript::LANGUAGE_TSX.into(),
        _ => return Extraction::default(),
    };

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        debug!(language = language.name(), error = %e, "Failed to set language");
        return Extraction::default();
    }

    let Some(tree) = parser.parse(content, None) else {
        debug!(language = language.name(), "Parser returned no tree");
        return Extraction::default();
    };

    let root = tree.root_node();
    if root.has_error() {
        debug!(language = language.name(), "Syntax errors, skipping structure");
        return Extraction::default();
    }

    let mut walker = SyntaxWalker {
        source: content,
        out: Extraction::default(),
    };

    match language {
        Language::Python => walker.python_block(root),
        Language::Rust => walker.rust_items(root),
        Language::Go => walker.go_items(root),
        Language::TypeScript | Language::JavaScript => walker.js_items(root),
        _ => {}
    }

    debug!(
        language = language.name(),
        functions = walker.out.functions.len(),
        classes = walker.out.classes.len(),
        "Extracted structure"
    );

    walker.out
}

struct SyntaxWalker<'a> {
    source: &'a str,
    out: Extraction,
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn start_line(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn end_line(node: Node<'_>) -> usize {
    node.end_position().row + 1
}

fn strip_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

impl<'a> SyntaxWalker<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
            .filter(|s| !s.is_empty())
    }

    fn push_function(
        &mut self,
        node: Node<'_>,
        name: String,
        parameters: Vec<String>,
        doc_summary: Option<String>,
        kind: FunctionKind,
    ) {
        self.out.functions.push(FunctionRecord {
            name,
            start_line: start_line(node),
            end_line: Some(end_line(node)),
            parameters,
            doc_summary,
            kind,
        });
    }

    fn push_class(
        &mut self,
        node: Node<'_>,
        name: String,
        base_types: Vec<String>,
        doc_summary: Option<String>,
    ) {
        self.out.classes.push(ClassRecord {
            name,
            start_line: start_line(node),
            end_line: Some(end_line(node)),
            base_types,
            doc_summary,
        });
    }

    // ---------------------------------------------------------------- Python

    fn python_block(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            self.python_statement(child);
        }
    }

    fn python_statement(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_definition" => self.python_function(node),
            "class_definition" => self.python_class(node),
            "decorated_definition" => {
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.python_statement(definition);
                }
            }
            "import_statement" => {
                for child in named_children(node) {
                    let target = match child.kind() {
                        "dotted_name" => Some(self.text(child).to_string()),
                        "aliased_import" => self.field_text(child, "name"),
                        _ => None,
                    };
                    if let Some(target) = target {
                        self.out.imports.push(target);
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = self.field_text(node, "module_name") {
                    let module = module.trim_start_matches('.');
                    if !module.is_empty() {
                        self.out.imports.push(module.to_string());
                    }
                }
            }
            "future_import_statement" => self.out.imports.push("__future__".to_string()),
            // Module-level control flow (try/except imports, platform switches)
            "if_statement" | "elif_clause" | "else_clause" | "try_statement"
            | "except_clause" | "finally_clause" | "with_statement" | "block" => {
                for child in named_children(node) {
                    self.python_statement(child);
                }
            }
            _ => {}
        }
    }

    fn python_function(&mut self, node: Node<'_>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };

        let mut parameters = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            for param in named_children(params) {
                let param_name = match param.kind() {
                    "identifier" => Some(self.text(param).to_string()),
                    "typed_parameter" => param
                        .named_child(0)
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| self.text(n).to_string()),
                    "default_parameter" | "typed_default_parameter" => {
                        self.field_text(param, "name")
                    }
                    _ => None,
                };
                parameters.extend(param_name);
            }
        }

        let kind = if name.starts_with("test") {
            FunctionKind::Test
        } else {
            FunctionKind::Function
        };
        let doc = self.python_docstring(node);
        self.push_function(node, name, parameters, doc, kind);
    }

    fn python_class(&mut self, node: Node<'_>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            for base in named_children(superclasses) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    bases.push(self.text(base).to_string());
                }
            }
        }

        let doc = self.python_docstring(node);
        self.push_class(node, name, bases, doc);

        if let Some(body) = node.child_by_field_name("body") {
            self.python_block(body);
        }
    }

    fn python_docstring(&self, node: Node<'_>) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0).filter(|n| n.kind() == "string")?;
        docstring_summary(self.text(string))
    }

    // ------------------------------------------------------------------ Rust

    fn rust_items(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            match child.kind() {
                "function_item" | "function_signature_item" => self.rust_function(child),
                "struct_item" | "enum_item" | "union_item" | "type_item" => {
                    if let Some(name) = self.field_text(child, "name") {
                        let (doc, _) = self.rust_leading(child);
                        self.push_class(child, name, Vec::new(), doc);
                    }
                }
                "trait_item" => {
                    let Some(name) = self.field_text(child, "name") else {
                        continue;
                    };
                    let bases: Vec<String> = child
                        .child_by_field_name("bounds")
                        .map(|bounds| {
                            named_children(bounds)
                                .into_iter()
                                .map(|b| self.text(b).to_string())
                                .collect()
                        })
                        .unwrap_or_default();
                    let (doc, _) = self.rust_leading(child);
                    self.push_class(child, name, bases, doc);

                    if let Some(body) = child.child_by_field_name("body") {
                        self.rust_items(body);
                    }
                }
                "impl_item" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        self.rust_items(body);
                    }
                }
                "mod_item" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        self.rust_items(body);
                    }
                }
                "use_declaration" => {
                    if let Some(argument) = child.child_by_field_name("argument") {
                        let path: String = self.text(argument).split_whitespace().collect();
                        self.out.imports.push(path);
                    }
                }
                "extern_crate_declaration" => {
                    if let Some(name) = self.field_text(child, "name") {
                        self.out.imports.push(name);
                    }
                }
                _ => {}
            }
        }
    }

    fn rust_function(&mut self, node: Node<'_>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };

        let mut parameters = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            for param in named_children(params) {
                match param.kind() {
                    "self_parameter" => parameters.push("self".to_string()),
                    "parameter" => parameters.extend(self.field_text(param, "pattern")),
                    _ => {}
                }
            }
        }

        let (doc, is_test) = self.rust_leading(node);
        let kind = if is_test {
            FunctionKind::Test
        } else {
            FunctionKind::Function
        };
        self.push_function(node, name, parameters, doc, kind);
    }

    /// Doc comment summary and `#[test]`-style attributes above an item.
    fn rust_leading(&self, node: Node<'_>) -> (Option<String>, bool) {
        let mut docs = Vec::new();
        let mut is_test = false;
        let mut current = node.prev_sibling();

        while let Some(prev) = current {
            let text = self.text(prev).trim();
            match prev.kind() {
                "attribute_item" => {
                    if text == "#[test]" || text.ends_with("::test]") || text.starts_with("#[test(")
                    {
                        is_test = true;
                    }
                }
                "line_comment" if text.starts_with("///") => docs.push(text),
                "block_comment" if text.starts_with("/**") => docs.push(text),
                _ => break,
            }
            current = prev.prev_sibling();
        }

        docs.reverse();
        (comment_summary(&docs.join("\n")), is_test)
    }

    // -------------------------------------------------------------------- Go

    fn go_items(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            match child.kind() {
                "function_declaration" | "method_declaration" => {
                    let Some(name) = self.field_text(child, "name") else {
                        continue;
                    };
                    let parameters = child
                        .child_by_field_name("parameters")
                        .map(|params| self.go_parameters(params))
                        .unwrap_or_default();
                    let kind = if name.starts_with("Test") {
                        FunctionKind::Test
                    } else {
                        FunctionKind::Function
                    };
                    let doc = self.line_comments_above(child);
                    self.push_function(child, name, parameters, doc, kind);
                }
                "type_declaration" => {
                    let doc = self.line_comments_above(child);
                    for spec in named_children(child) {
                        if spec.kind() != "type_spec" {
                            continue;
                        }
                        let Some(name) = self.field_text(spec, "name") else {
                            continue;
                        };
                        let Some(ty) = spec.child_by_field_name("type") else {
                            continue;
                        };
                        if !matches!(ty.kind(), "struct_type" | "interface_type") {
                            continue;
                        }
                        let bases = self.go_embedded(ty);
                        self.push_class(spec, name, bases, doc.clone());
                    }
                }
                "import_declaration" => self.go_imports(child),
                _ => {}
            }
        }
    }

    fn go_parameters(&self, params: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        for decl in named_children(params) {
            if !matches!(
                decl.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                continue;
            }
            let mut cursor = decl.walk();
            for name in decl.children_by_field_name("name", &mut cursor) {
                names.push(self.text(name).to_string());
            }
        }
        names
    }

    /// Embedded (anonymous) fields of a struct act as its base types.
    fn go_embedded(&self, ty: Node<'_>) -> Vec<String> {
        let mut bases = Vec::new();
        if ty.kind() != "struct_type" {
            return bases;
        }
        for list in named_children(ty) {
            if list.kind() != "field_declaration_list" {
                continue;
            }
            for field in named_children(list) {
                if field.kind() == "field_declaration" && field.child_by_field_name("name").is_none()
                {
                    if let Some(ty) = self.field_text(field, "type") {
                        bases.push(ty.trim_start_matches('*').to_string());
                    }
                }
            }
        }
        bases
    }

    fn go_imports(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            match child.kind() {
                "import_spec" => {
                    if let Some(path) = child.child_by_field_name("path") {
                        self.out.imports.push(strip_quotes(self.text(path)).to_string());
                    }
                }
                "import_spec_list" => self.go_imports(child),
                _ => {}
            }
        }
    }

    /// Contiguous `comment` siblings ending on the line directly above `node`.
    fn line_comments_above(&self, node: Node<'_>) -> Option<String> {
        let mut docs = Vec::new();
        let mut expected_row = node.start_position().row;
        let mut current = node.prev_sibling();

        while let Some(prev) = current {
            if prev.kind() != "comment" || prev.end_position().row + 1 < expected_row {
                break;
            }
            docs.push(self.text(prev));
            expected_row = prev.start_position().row;
            current = prev.prev_sibling();
        }

        docs.reverse();
        comment_summary(&docs.join("\n"))
    }

    // ------------------------------------------------------- TypeScript / JS

    fn js_items(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            self.js_statement(child, child);
        }
    }

    fn js_statement(&mut self, node: Node<'_>, doc_anchor: Node<'_>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = self.field_text(node, "name") {
                    let parameters = self.js_parameters(node);
                    let doc = self.jsdoc(doc_anchor);
                    self.push_function(node, name, parameters, doc, FunctionKind::Function);
                }
            }
            "class_declaration" | "abstract_class_declaration" => self.js_class(node, doc_anchor),
            "interface_declaration" => {
                let Some(name) = self.field_text(node, "name") else {
                    return;
                };
                let mut bases = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "extends_type_clause" {
                        bases.extend(named_children(child).into_iter().map(|t| self.text(t).to_string()));
                    }
                }
                let doc = self.jsdoc(doc_anchor);
                self.push_class(node, name, bases, doc);
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(node) {
                    if declarator.kind() == "variable_declarator" {
                        self.js_declarator(declarator, doc_anchor);
                    }
                }
            }
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    self.js_statement(declaration, doc_anchor);
                }
                if let Some(source) = node.child_by_field_name("source") {
                    self.out.imports.push(strip_quotes(self.text(source)).to_string());
                }
            }
            "import_statement" => {
                if let Some(source) = node.child_by_field_name("source") {
                    self.out.imports.push(strip_quotes(self.text(source)).to_string());
                }
            }
            _ => {}
        }
    }

    fn js_declarator(&mut self, declarator: Node<'_>, doc_anchor: Node<'_>) {
        let Some(value) = declarator.child_by_field_name("value") else {
            return;
        };

        match value.kind() {
            "arrow_function" | "function_expression" | "function" => {
                let Some(name) = declarator
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| self.text(n).to_string())
                else {
                    return;
                };
                let parameters = match value.child_by_field_name("parameter") {
                    Some(single) => vec![self.text(single).to_string()],
                    None => self.js_parameters(value),
                };
                let doc = self.jsdoc(doc_anchor);
                // The declarator spans the whole assignment, not just the value
                self.push_function(declarator, name, parameters, doc, FunctionKind::Function);
            }
            "call_expression" => {
                let is_require = value
                    .child_by_field_name("function")
                    .is_some_and(|f| self.text(f) == "require");
                if !is_require {
                    return;
                }
                if let Some(args) = value.child_by_field_name("arguments") {
                    if let Some(first) = args.named_child(0).filter(|a| a.kind() == "string") {
                        self.out.imports.push(strip_quotes(self.text(first)).to_string());
                    }
                }
            }
            _ => {}
        }
    }

    fn js_class(&mut self, node: Node<'_>, doc_anchor: Node<'_>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };

        let mut bases = Vec::new();
        for child in named_children(node) {
            if child.kind() != "class_heritage" {
                continue;
            }
            for clause in named_children(child) {
                for base in named_children(clause) {
                    if base.kind() != "type_arguments" {
                        bases.push(self.text(base).to_string());
                    }
                }
            }
        }

        let doc = self.jsdoc(doc_anchor);
        self.push_class(node, name, bases, doc);

        if let Some(body) = node.child_by_field_name("body") {
            for member in named_children(body) {
                if member.kind() != "method_definition" {
                    continue;
                }
                if let Some(method) = self.field_text(member, "name") {
                    let parameters = self.js_parameters(member);
                    let doc = self.jsdoc(member);
                    self.push_function(member, method, parameters, doc, FunctionKind::Function);
                }
            }
        }
    }

    fn js_parameters(&self, node: Node<'_>) -> Vec<String> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };

        named_children(params)
            .into_iter()
            .filter_map(|param| match param.kind() {
                "required_parameter" | "optional_parameter" => self.field_text(param, "pattern"),
                "identifier" => Some(self.text(param).to_string()),
                _ => None,
            })
            .collect()
    }

    fn jsdoc(&self, anchor: Node<'_>) -> Option<String> {
        let prev = anchor.prev_sibling()?;
        let text = self.text(prev);
        if prev.kind() == "comment" && text.starts_with("/**") {
            comment_summary(text)
        } else {
            None
        }
    }
}

/// First line of a Python docstring literal, quotes and prefixes removed.
fn docstring_summary(literal: &str) -> Option<String> {
    let body = literal.trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    let body = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| body.strip_prefix(q).and_then(|b| b.strip_suffix(q)))
        .unwrap_or(body);

    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
