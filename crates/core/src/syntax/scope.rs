//! Lexical scope resolution: which identifiers inside a subtree are free.
//!
//! Function scopes bind their parameters, their own name (for named function
//! expressions), `var` declarations anywhere in the body and the direct
//! declarations of the body block. Blocks, `for` heads and `catch` clauses
//! bind their direct declarations. Anything left unbound is reported once, in
//! order of first occurrence.

use std::collections::HashSet;
use std::ops::Range;

use tree_sitter::Node;

use super::node_text;

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

pub fn is_function_like(kind: &str) -> bool {
    FUNCTION_KINDS.contains(&kind)
}

/// One occurrence of a free identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub name: String,
    pub range: Range<usize>,
    /// `{ name }` shorthand in an object literal or pattern; renaming it must keep the key.
    pub shorthand: bool,
}

/// Free identifiers of `node`, deduplicated, in order of first occurrence.
pub fn free_identifiers(node: Node<'_>, source: &str) -> Vec<String> {
    walk(node, source).out
}

/// Every occurrence of a free identifier under `node`, in source order.
/// Declared names of a top-level statement count as free at that level.
pub fn free_occurrences(node: Node<'_>, source: &str) -> Vec<Occurrence> {
    walk(node, source).occurrences
}

fn walk<'s>(node: Node<'_>, source: &'s str) -> Walker<'s> {
    let mut walker = Walker {
        source,
        scopes: Vec::new(),
        seen: HashSet::new(),
        out: Vec::new(),
        occurrences: Vec::new(),
    };
    walker.visit(node);
    walker
}

/// Names bound by a binding pattern (identifier, destructuring, parameter).
pub fn pattern_bindings(node: Node<'_>, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    collect_pattern(node, source, &mut names);
    names
}

fn collect_pattern(node: Node<'_>, source: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            out.push(node_text(node, source).to_string())
        }
        "required_parameter" | "optional_parameter" => {
            if let Some(pattern) = node.child_by_field_name("pattern") {
                collect_pattern(pattern, source, out);
            }
        }
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect_pattern(value, source, out);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                collect_pattern(left, source, out);
            }
        }
        "object_pattern" | "array_pattern" | "rest_pattern" | "formal_parameters" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_pattern(child, source, out);
            }
        }
        _ => {}
    }
}

/// Declarations made directly inside a block-like node.
fn direct_declarations(block: Node<'_>, source: &str, out: &mut HashSet<String>) {
    let mut cursor = block.walk();
    for stmt in block.named_children(&mut cursor) {
        match stmt.kind() {
            "lexical_declaration" | "variable_declaration" => {
                out.extend(super::declared_names(stmt, source));
            }
            "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration" => {
                if let Some(name) = stmt.child_by_field_name("name") {
                    out.insert(node_text(name, source).to_string());
                }
            }
            _ => {}
        }
    }
}

/// `var` declarations anywhere under `node`, not crossing nested functions or classes.
fn hoisted_vars(node: Node<'_>, source: &str, out: &mut HashSet<String>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = child.kind();
        if is_function_like(kind) || CLASS_KINDS.contains(&kind) {
            continue;
        }
        if kind == "variable_declaration" {
            out.extend(super::declared_names(child, source));
        }
        hoisted_vars(child, source, out);
    }
}

struct Walker<'s> {
    source: &'s str,
    scopes: Vec<HashSet<String>>,
    seen: HashSet<String>,
    out: Vec<String>,
    occurrences: Vec<Occurrence>,
}

impl<'s> Walker<'s> {
    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn reference(&mut self, node: Node<'_>) {
        let name = node_text(node, self.source);
        if name.is_empty() || self.is_bound(name) {
            return;
        }
        self.occurrences.push(Occurrence {
            name: name.to_string(),
            range: node.byte_range(),
            shorthand: node.kind().starts_with("shorthand_property_identifier"),
        });
        if self.seen.insert(name.to_string()) {
            self.out.push(name.to_string());
        }
    }

    fn visit_children_except(&mut self, node: Node<'_>, skip: Option<usize>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if Some(child.id()) == skip {
                continue;
            }
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind = node.kind();
        match kind {
            "identifier"
            | "shorthand_property_identifier"
            | "shorthand_property_identifier_pattern"
            | "type_identifier" => {
                self.reference(node);
            }
            _ if is_function_like(kind) => self.visit_function(node),
            _ if CLASS_KINDS.contains(&kind) => {
                let name = node.child_by_field_name("name");
                let mut scope = HashSet::new();
                if let Some(name) = name {
                    if kind == "class" {
                        scope.insert(node_text(name, self.source).to_string());
                    } else {
                        self.reference(name);
                    }
                }
                self.scopes.push(scope);
                self.visit_children_except(node, name.map(|n| n.id()));
                self.scopes.pop();
            }
            "statement_block" | "class_body" | "switch_body" => {
                let mut scope = HashSet::new();
                direct_declarations(node, self.source, &mut scope);
                self.scopes.push(scope);
                self.visit_children_except(node, None);
                self.scopes.pop();
            }
            "for_statement" | "for_in_statement" => {
                let mut scope = HashSet::new();
                if let Some(init) = node.child_by_field_name("initializer") {
                    scope.extend(super::declared_names(init, self.source));
                }
                if node.child_by_field_name("kind").is_some() {
                    if let Some(left) = node.child_by_field_name("left") {
                        scope.extend(pattern_bindings(left, self.source));
                    }
                }
                self.scopes.push(scope);
                self.visit_children_except(node, None);
                self.scopes.pop();
            }
            "catch_clause" => {
                let mut scope = HashSet::new();
                if let Some(param) = node.child_by_field_name("parameter") {
                    scope.extend(pattern_bindings(param, self.source));
                }
                self.scopes.push(scope);
                self.visit_children_except(node, None);
                self.scopes.pop();
            }
            _ => self.visit_children_except(node, None),
        }
    }

    fn visit_function(&mut self, node: Node<'_>) {
        let kind = node.kind();
        let name = node.child_by_field_name("name");
        let mut scope = HashSet::new();

        if let Some(name) = name {
            if kind.ends_with("_declaration") {
                // The declared name lives in the enclosing scope.
                self.reference(name);
            } else if kind != "method_definition" {
                scope.insert(node_text(name, self.source).to_string());
            }
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            scope.extend(pattern_bindings(params, self.source));
        }
        if let Some(param) = node.child_by_field_name("parameter") {
            scope.extend(pattern_bindings(param, self.source));
        }
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                direct_declarations(body, self.source, &mut scope);
                hoisted_vars(body, self.source, &mut scope);
            }
        }

        self.scopes.push(scope);
        // Method names are property identifiers; skipping them keeps computed keys visited.
        let skip = if kind == "method_definition" { None } else { name.map(|n| n.id()) };
        self.visit_children_except(node, skip);
        self.scopes.pop();
    }
}
