//! Module-level syntax model built on tree-sitter.
//!
//! Every other stage (summarizer, slicer, native bundler) looks at a resolver
//! through `ParsedModule`: the owned source text, its tree, and one
//! `TopLevelStatement` per program-level statement with the names it defines,
//! references and mutates. Comments are not statements; they stay in the gaps
//! between statements.

pub mod erase;
pub mod literal;
pub mod scope;

use std::ops::Range;

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

pub use erase::erase_types;
pub use literal::string_value;
pub use scope::{free_identifiers, free_occurrences, pattern_bindings, Occurrence};

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("Failed to load the TypeScript grammar: {0}")]
    Language(String),
    #[error("Parser produced no syntax tree for {0}")]
    NoTree(String),
    #[error("Syntax error in {label} at {line}:{column} near `{snippet}`")]
    Invalid { label: String, line: usize, column: usize, snippet: String },
    #[error("Unsupported syntax in {label} at line {line}: {construct}")]
    Unsupported { label: String, line: usize, construct: String },
}

/// Parse `source` with the TypeScript grammar (a superset of the JavaScript we emit).
pub fn parse_tree(source: &str, label: &str) -> Result<Tree, SyntaxError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_typescript::language_typescript())
        .map_err(|e| SyntaxError::Language(e.to_string()))?;
    let tree = parser.parse(source, None).ok_or_else(|| SyntaxError::NoTree(label.to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let bad = first_error(root).unwrap_or(root);
        let pos = bad.start_position();
        let snippet: String = source
            .get(bad.byte_range())
            .unwrap_or_default()
            .chars()
            .take(40)
            .collect();
        return Err(SyntaxError::Invalid {
            label: label.to_string(),
            line: pos.row + 1,
            column: pos.column + 1,
            snippet,
        });
    }
    Ok(tree)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

/// What an imported binding refers to in its source module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imported {
    Named(String),
    Default,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Name bound in the importing module (the alias when one is given).
    pub local: String,
    pub imported: Imported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub source: String,
    pub bindings: Vec<ImportBinding>,
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedName {
    pub local: String,
    pub exported: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Import(ImportInfo),
    /// `export default <expr>` or `export default <declaration>`.
    ExportDefault,
    /// `export { a, b as c }`, optionally re-exported `from` a source.
    ExportClause { names: Vec<ExportedName>, source: Option<String> },
    /// `export * from "..."`.
    ExportAll { source: String },
    /// A declaration, exported or not.
    Declaration { exported: bool },
    Other,
}

#[derive(Debug, Clone)]
pub struct TopLevelStatement {
    /// Position among top-level statements.
    pub index: usize,
    /// Child index of the statement node under the program root.
    pub child_index: usize,
    pub range: Range<usize>,
    pub kind: StatementKind,
    pub defines: Vec<String>,
    /// Free identifiers, first-occurrence order, without the statement's own definitions.
    pub references: Vec<String>,
    /// Names this statement may change without declaring them: assignment
    /// targets, plus every reference of a non-declaration statement.
    pub mutates: Vec<String>,
}

/// A parsed module together with its top-level statement table.
pub struct ParsedModule {
    label: String,
    source: String,
    tree: Tree,
    statements: Vec<TopLevelStatement>,
}

impl std::fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedModule")
            .field("label", &self.label)
            .field("statements", &self.statements.len())
            .finish()
    }
}

impl ParsedModule {
    pub fn parse(source: impl Into<String>, label: impl Into<String>) -> Result<Self, SyntaxError> {
        let source = source.into();
        let label = label.into();
        let tree = parse_tree(&source, &label)?;
        let statements = collect_statements(&tree, &source);
        Ok(Self { label, source, tree, statements })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn statements(&self) -> &[TopLevelStatement] {
        &self.statements
    }

    pub fn statement_node(&self, statement: &TopLevelStatement) -> Option<Node<'_>> {
        self.root().child(statement.child_index)
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node_text(node, &self.source)
    }

    /// Statements that define `name`, in source order.
    pub fn definitions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TopLevelStatement> {
        self.statements.iter().filter(move |s| s.defines.iter().any(|d| d == name))
    }

    /// Every name defined at the top level.
    pub fn top_level_names(&self) -> Vec<&str> {
        self.statements.iter().flat_map(|s| s.defines.iter().map(String::as_str)).collect()
    }

    /// The import binding that introduced `local`, if any.
    pub fn import_binding(&self, local: &str) -> Option<(&ImportInfo, &ImportBinding)> {
        self.statements.iter().find_map(|s| match &s.kind {
            StatementKind::Import(info) => {
                info.bindings.iter().find(|b| b.local == local).map(|b| (info, b))
            }
            _ => None,
        })
    }
}

pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

/// Remove the surrounding quotes of a module specifier node.
fn specifier(node: Node<'_>, source: &str) -> String {
    string_value(node, source).unwrap_or_else(|| {
        node_text(node, source).trim_matches(|c| c == '"' || c == '\'').to_string()
    })
}

fn collect_statements(tree: &Tree, source: &str) -> Vec<TopLevelStatement> {
    let root = tree.root_node();
    let mut out = Vec::new();
    for child_index in 0..root.child_count() {
        let Some(node) = root.child(child_index) else { continue };
        if !node.is_named() || matches!(node.kind(), "comment" | "hash_bang_line") {
            continue;
        }
        let kind = classify(node, source);
        let defines = match &kind {
            StatementKind::Import(info) => info.bindings.iter().map(|b| b.local.clone()).collect(),
            _ => declared_names(node, source),
        };
        let (references, mutates) = match &kind {
            StatementKind::Import(_) | StatementKind::ExportAll { .. } => (Vec::new(), Vec::new()),
            StatementKind::ExportClause { source: Some(_), .. } => (Vec::new(), Vec::new()),
            _ => {
                let refs: Vec<String> = free_identifiers(node, source)
                    .into_iter()
                    .filter(|name| !defines.contains(name))
                    .collect();
                let mut mutates = mutated_names(node, source);
                // Calls, loops and other bare statements may populate anything they touch.
                if kind == StatementKind::Other {
                    for name in &refs {
                        if !mutates.contains(name) {
                            mutates.push(name.clone());
                        }
                    }
                }
                (refs, mutates)
            }
        };
        out.push(TopLevelStatement {
            index: out.len(),
            child_index,
            range: node.byte_range(),
            kind,
            defines,
            references,
            mutates,
        });
    }
    out
}

fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| !c.is_named() && c.kind() == token);
    found
}

fn classify(node: Node<'_>, source: &str) -> StatementKind {
    match node.kind() {
        "import_statement" => StatementKind::Import(import_info(node, source)),
        "export_statement" => {
            if has_token(node, "default") {
                return StatementKind::ExportDefault;
            }
            if node.child_by_field_name("declaration").is_some() {
                return StatementKind::Declaration { exported: true };
            }
            let from = node.child_by_field_name("source").map(|s| specifier(s, source));
            let mut cursor = node.walk();
            let clause = node.named_children(&mut cursor).find(|c| c.kind() == "export_clause");
            match (clause, from) {
                (Some(clause), from) => StatementKind::ExportClause {
                    names: export_names(clause, source),
                    source: from,
                },
                (None, Some(from)) => StatementKind::ExportAll { source: from },
                (None, None) => StatementKind::Other,
            }
        }
        "lexical_declaration"
        | "variable_declaration"
        | "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "abstract_class_declaration"
        | "interface_declaration"
        | "type_alias_declaration"
        | "enum_declaration" => StatementKind::Declaration { exported: false },
        _ => StatementKind::Other,
    }
}

fn import_info(node: Node<'_>, source: &str) -> ImportInfo {
    let from = node.child_by_field_name("source").map(|s| specifier(s, source)).unwrap_or_default();
    let type_only = node.child(1).map(|c| !c.is_named() && c.kind() == "type").unwrap_or(false);
    let mut bindings = Vec::new();

    let mut cursor = node.walk();
    for clause in node.named_children(&mut cursor).filter(|c| c.kind() == "import_clause") {
        let mut clause_cursor = clause.walk();
        for part in clause.named_children(&mut clause_cursor) {
            match part.kind() {
                "identifier" => bindings.push(ImportBinding {
                    local: node_text(part, source).to_string(),
                    imported: Imported::Default,
                }),
                "namespace_import" => {
                    let mut ns_cursor = part.walk();
                    let name = part.named_children(&mut ns_cursor).find(|c| c.kind() == "identifier");
                    if let Some(name) = name {
                        bindings.push(ImportBinding {
                            local: node_text(name, source).to_string(),
                            imported: Imported::Namespace,
                        });
                    }
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    for spec in part.named_children(&mut spec_cursor) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else { continue };
                        let imported = specifier(name, source);
                        let local = spec
                            .child_by_field_name("alias")
                            .map(|a| node_text(a, source).to_string())
                            .unwrap_or_else(|| imported.clone());
                        let imported = if imported == "default" {
                            Imported::Default
                        } else {
                            Imported::Named(imported)
                        };
                        bindings.push(ImportBinding { local, imported });
                    }
                }
                _ => {}
            }
        }
    }

    ImportInfo { source: from, bindings, type_only }
}

fn export_names(clause: Node<'_>, source: &str) -> Vec<ExportedName> {
    let mut out = Vec::new();
    let mut cursor = clause.walk();
    for spec in clause.named_children(&mut cursor) {
        if spec.kind() != "export_specifier" {
            continue;
        }
        let Some(name) = spec.child_by_field_name("name") else { continue };
        let local = specifier(name, source);
        let exported = spec
            .child_by_field_name("alias")
            .map(|a| specifier(a, source))
            .unwrap_or_else(|| local.clone());
        out.push(ExportedName { local, exported });
    }
    out
}

/// Names a top-level declaration (possibly wrapped in `export`) binds.
pub fn declared_names(node: Node<'_>, source: &str) -> Vec<String> {
    match node.kind() {
        "export_statement" => node
            .child_by_field_name("declaration")
            .map(|decl| declared_names(decl, source))
            .unwrap_or_default(),
        "lexical_declaration" | "variable_declaration" => {
            let mut names = Vec::new();
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(pattern) = declarator.child_by_field_name("name") {
                    names.extend(pattern_bindings(pattern, source));
                }
            }
            names
        }
        "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "abstract_class_declaration"
        | "interface_declaration"
        | "type_alias_declaration"
        | "enum_declaration" => node
            .child_by_field_name("name")
            .map(|n| vec![node_text(n, source).to_string()])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Names an expression statement assigns to, e.g. `x = 1`, `config.retries += 2`, `n++`.
fn mutated_names(node: Node<'_>, source: &str) -> Vec<String> {
    if node.kind() != "expression_statement" {
        return Vec::new();
    }
    let Some(expr) = node.named_child(0) else { return Vec::new() };
    let target = match expr.kind() {
        "assignment_expression" | "augmented_assignment_expression" => {
            expr.child_by_field_name("left")
        }
        "update_expression" => expr.child_by_field_name("argument"),
        _ => None,
    };
    let mut target = match target {
        Some(t) => t,
        None => return Vec::new(),
    };
    while matches!(target.kind(), "member_expression" | "subscript_expression") {
        match target.child_by_field_name("object") {
            Some(object) => target = object,
            None => return Vec::new(),
        }
    }
    if target.kind() == "identifier" {
        vec![node_text(target, source).to_string()]
    } else {
        Vec::new()
    }
}
