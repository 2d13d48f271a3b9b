//! Static step summarizer.
//!
//! The bundled module is never executed. The resolver is found by following
//! the default export to a call of the framework's resolver factory and its
//! configuration object literal is read directly from the tree.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use tree_sitter::Node;

use super::ResolverConvention;
use crate::model::{OperationKind, ResolverSummary, Step, StepKind};
use crate::syntax::scope::is_function_like;
use crate::syntax::{string_value, Imported, ParsedModule, StatementKind, SyntaxError};

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Failed to read bundled resolver {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("{label} has no default export; expected `export default {factory}({{ ... }})`")]
    NoDefaultExport { label: String, factory: String },
    #[error("Default export of {label} is not a `{factory}` call from `{framework}` (found `{found}`)")]
    NotAResolver { label: String, factory: String, framework: String, found: String },
    #[error("Invalid resolver definition in {label}: {reason}")]
    InvalidDefinition { label: String, reason: String },
    #[error("Resolver in {label} is missing required field `{field}`")]
    MissingField { label: String, field: String },
    #[error("Step `{step}` in {label} has unsupported kind `{kind}` (expected function, sql or graphql)")]
    UnsupportedStepKind { label: String, step: String, kind: String },
    #[error("Step name `{name}` is declared more than once in {label}")]
    DuplicateStep { label: String, name: String },
    #[error("Step `{step}` in {label}: `fn` must be a function expression or arrow function")]
    NotAFunction { label: String, step: String },
}

/// Read a bundled resolver module from disk and summarize it.
pub fn summarize(
    path: &Path,
    convention: &ResolverConvention,
) -> Result<ResolverSummary, SummaryError> {
    let source = fs::read_to_string(path)
        .map_err(|source| SummaryError::Read { path: path.to_path_buf(), source })?;
    let module = ParsedModule::parse(source, path.display().to_string())?;
    summarize_module(&module, convention)
}

pub fn summarize_module(
    module: &ParsedModule,
    convention: &ResolverConvention,
) -> Result<ResolverSummary, SummaryError> {
    let reader = Reader { module, convention };
    let exported = reader.default_export()?;
    let config = reader.factory_argument(exported)?;
    let summary = reader.read_summary(config)?;
    debug!(resolver = %summary.name, steps = summary.steps.len(), "summarized resolver");
    Ok(summary)
}

/// Object literal fields, keyed by property name.
struct Fields<'t> {
    entries: Vec<(String, Node<'t>)>,
}

impl<'t> Fields<'t> {
    fn get(&self, key: &str) -> Option<Node<'t>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }
}

struct Reader<'m> {
    module: &'m ParsedModule,
    convention: &'m ResolverConvention,
}

impl<'m> Reader<'m> {
    fn label(&self) -> String {
        self.module.label().to_string()
    }

    fn invalid(&self, reason: impl Into<String>) -> SummaryError {
        SummaryError::InvalidDefinition { label: self.label(), reason: reason.into() }
    }

    /// Expression exported as default, by either `export default` or `export { x as default }`.
    fn default_export(&self) -> Result<Node<'m>, SummaryError> {
        for stmt in self.module.statements() {
            match &stmt.kind {
                StatementKind::ExportDefault => {
                    let node = self.module.statement_node(stmt);
                    if let Some(value) = node.and_then(|n| n.child_by_field_name("value")) {
                        return Ok(value);
                    }
                    if let Some(decl) = node.and_then(|n| n.child_by_field_name("declaration")) {
                        return Err(self.not_a_resolver(decl));
                    }
                }
                StatementKind::ExportClause { names, source: None } => {
                    if let Some(name) = names.iter().find(|n| n.exported == "default") {
                        return self
                            .binding_value(&name.local)
                            .ok_or_else(|| self.invalid(format!(
                                "default export `{}` is not initialised in this module",
                                name.local
                            )));
                    }
                }
                _ => {}
            }
        }
        Err(SummaryError::NoDefaultExport {
            label: self.label(),
            factory: self.convention.resolver_factory.clone(),
        })
    }

    fn not_a_resolver(&self, node: Node<'_>) -> SummaryError {
        let found: String = self.module.text(node).chars().take(60).collect();
        SummaryError::NotAResolver {
            label: self.label(),
            factory: self.convention.resolver_factory.clone(),
            framework: self.convention.framework_module.clone(),
            found,
        }
    }

    /// Initialiser of a top-level `const`/`let`/`var` binding named `name`.
    fn binding_value(&self, name: &str) -> Option<Node<'m>> {
        for stmt in self.module.definitions_of(name) {
            let mut node = self.module.statement_node(stmt)?;
            if node.kind() == "export_statement" {
                node = node.child_by_field_name("declaration")?;
            }
            if !matches!(node.kind(), "lexical_declaration" | "variable_declaration") {
                continue;
            }
            let mut cursor = node.walk();
            let declarators: Vec<Node<'m>> = node.named_children(&mut cursor).collect();
            for declarator in declarators {
                let matches_name = declarator
                    .child_by_field_name("name")
                    .map(|n| n.kind() == "identifier" && self.module.text(n) == name)
                    .unwrap_or(false);
                if matches_name {
                    return declarator.child_by_field_name("value");
                }
            }
        }
        None
    }

    /// Follow parentheses and identifier aliases to the underlying expression.
    fn resolve(&self, mut node: Node<'m>) -> Node<'m> {
        let mut seen = HashSet::new();
        loop {
            match node.kind() {
                "parenthesized_expression" => match node.named_child(0) {
                    Some(inner) => node = inner,
                    None => return node,
                },
                "identifier" | "shorthand_property_identifier" => {
                    let name = self.module.text(node);
                    if !seen.insert(name.to_string()) {
                        return node;
                    }
                    match self.binding_value(name) {
                        Some(value) => node = value,
                        None => return node,
                    }
                }
                _ => return node,
            }
        }
    }

    /// First argument of the resolver factory call behind `exported`.
    fn factory_argument(&self, exported: Node<'m>) -> Result<Node<'m>, SummaryError> {
        let call = self.resolve(exported);
        if call.kind() != "call_expression" {
            return Err(self.not_a_resolver(call));
        }
        let callee = call.child_by_field_name("function").ok_or_else(|| self.not_a_resolver(call))?;
        if !self.is_factory(callee) {
            return Err(self.not_a_resolver(callee));
        }
        let args = call.child_by_field_name("arguments").ok_or_else(|| self.not_a_resolver(call))?;
        let mut cursor = args.walk();
        let first = args.named_children(&mut cursor).find(|c| c.kind() != "comment");
        let first = first.ok_or_else(|| self.invalid("resolver factory called without arguments"))?;
        let object = self.resolve(first);
        if object.kind() != "object" {
            return Err(self.invalid("resolver definition must be an object literal"));
        }
        Ok(object)
    }

    fn is_factory(&self, callee: Node<'_>) -> bool {
        let factory = self.convention.resolver_factory.as_str();
        match callee.kind() {
            "identifier" => match self.module.import_binding(self.module.text(callee)) {
                Some((info, binding)) => {
                    self.convention.is_framework(&info.source)
                        && binding.imported == Imported::Named(factory.to_string())
                }
                None => false,
            },
            "member_expression" => {
                let object = callee.child_by_field_name("object");
                let property = callee.child_by_field_name("property");
                match (object, property) {
                    (Some(object), Some(property)) if object.kind() == "identifier" => {
                        self.module.text(property) == factory
                            && matches!(
                                self.module.import_binding(self.module.text(object)),
                                Some((info, binding))
                                    if self.convention.is_framework(&info.source)
                                        && binding.imported == Imported::Namespace
                            )
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn fields(&self, object: Node<'m>) -> Result<Fields<'m>, SummaryError> {
        let mut entries = Vec::new();
        let mut cursor = object.walk();
        for child in object.named_children(&mut cursor) {
            match child.kind() {
                "pair" => {
                    let key = child.child_by_field_name("key");
                    let value = child.child_by_field_name("value");
                    let (Some(key), Some(value)) = (key, value) else { continue };
                    let key = match key.kind() {
                        "property_identifier" => self.module.text(key).to_string(),
                        "string" => string_value(key, self.module.source()).unwrap_or_default(),
                        _ => {
                            return Err(self.invalid(format!(
                                "unsupported property key `{}`",
                                self.module.text(key)
                            )))
                        }
                    };
                    entries.push((key, value));
                }
                "shorthand_property_identifier" => {
                    entries.push((self.module.text(child).to_string(), child));
                }
                "comment" => {}
                other => {
                    return Err(self.invalid(format!(
                        "unsupported `{other}` in resolver definition; use plain `key: value` properties"
                    )))
                }
            }
        }
        Ok(Fields { entries })
    }

    fn string_field(&self, fields: &Fields<'m>, key: &str) -> Result<Option<String>, SummaryError> {
        let Some(value) = fields.get(key) else { return Ok(None) };
        let value = self.resolve(value);
        string_value(value, self.module.source())
            .map(Some)
            .ok_or_else(|| self.invalid(format!("field `{key}` must be a string literal")))
    }

    fn required_string(&self, fields: &Fields<'m>, key: &str) -> Result<String, SummaryError> {
        self.string_field(fields, key)?
            .ok_or_else(|| SummaryError::MissingField { label: self.label(), field: key.to_string() })
    }

    fn read_summary(&self, object: Node<'m>) -> Result<ResolverSummary, SummaryError> {
        let fields = self.fields(object)?;
        let name = self.required_string(&fields, "name")?;
        let operation = match self.string_field(&fields, "operation")?.as_deref() {
            None | Some("query") => OperationKind::Query,
            Some("mutation") => OperationKind::Mutation,
            Some(other) => {
                return Err(self.invalid(format!(
                    "operation must be \"query\" or \"mutation\", got \"{other}\""
                )))
            }
        };
        let steps_node = fields.get("steps").ok_or_else(|| SummaryError::MissingField {
            label: self.label(),
            field: "steps".to_string(),
        })?;
        let steps = self.read_steps(self.resolve(steps_node))?;

        Ok(ResolverSummary {
            name,
            operation,
            description: self.string_field(&fields, "description")?,
            args: self.string_field(&fields, "args")?,
            returns: self.string_field(&fields, "returns")?.unwrap_or_else(|| "JSON".to_string()),
            steps,
        })
    }

    fn read_steps(&self, array: Node<'m>) -> Result<Vec<Step>, SummaryError> {
        if array.kind() != "array" {
            return Err(self.invalid("`steps` must be an array literal"));
        }
        let mut steps: Vec<Step> = Vec::new();
        let mut cursor = array.walk();
        let items: Vec<Node<'m>> =
            array.named_children(&mut cursor).filter(|c| c.kind() != "comment").collect();
        for (index, item) in items.into_iter().enumerate() {
            let object = self.resolve(item);
            if object.kind() != "object" {
                return Err(self.invalid(format!("step #{} must be an object literal", index + 1)));
            }
            let step = self.read_step(object)?;
            if steps.iter().any(|s| s.name == step.name) {
                return Err(SummaryError::DuplicateStep { label: self.label(), name: step.name });
            }
            steps.push(step);
        }
        if steps.is_empty() {
            return Err(self.invalid("resolver declares no steps"));
        }
        Ok(steps)
    }

    fn read_step(&self, object: Node<'m>) -> Result<Step, SummaryError> {
        let fields = self.fields(object)?;
        let name = self.required_string(&fields, "name")?;
        let kind_text = self.required_string(&fields, "kind")?;
        let kind: StepKind = kind_text.parse().map_err(|kind| SummaryError::UnsupportedStepKind {
            label: self.label(),
            step: name.clone(),
            kind,
        })?;

        let closure = fields.get("fn").ok_or_else(|| SummaryError::MissingField {
            label: self.label(),
            field: format!("steps[{name}].fn"),
        })?;
        let closure = self.resolve(closure);
        if !is_function_like(closure.kind()) || closure.kind().ends_with("_declaration") {
            return Err(SummaryError::NotAFunction { label: self.label(), step: name });
        }

        let mut step = Step::new(kind, name, self.module.text(closure))
            .with_range(closure.byte_range());
        step.description = self.string_field(&fields, "description")?;
        step.schema = self.string_field(&fields, "schema")?;
        Ok(step)
    }
}
