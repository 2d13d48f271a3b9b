//! Program slicer.
//!
//! Given a bundled resolver module and its summarized steps, remove the
//! framework scaffolding and compute, for each step closure, the top-level
//! statements it needs. Pure: text and steps in, text out.

use std::collections::HashSet;
use std::ops::Range;

use thiserror::Error;
use tracing::debug;
use tree_sitter::Node;

use super::graph::{Reachability, RemovalSet, StatementEdges, StatementGraph, SymbolId};
use super::ResolverConvention;
use crate::model::{Step, StepKind};
use crate::syntax::scope::is_function_like;
use crate::syntax::{free_identifiers, ParsedModule, StatementKind, SyntaxError, TopLevelStatement};

/// Prefix of every generated step export.
pub const STEP_EXPORT_PREFIX: &str = "__step_";

#[derive(Debug, Error)]
pub enum SliceError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("Step name `{0}` is declared more than once")]
    DuplicateStep(String),
    #[error("Closure of step `{step}` could not be located in {label}")]
    ClosureNotFound { step: String, label: String },
    #[error("Closure of step `{step}` in {label} is not a function expression")]
    NotAFunction { step: String, label: String },
    #[error("Step `{step}` uses `{symbol}`, which only exists through the framework import")]
    RemovedReference { step: String, symbol: String },
}

/// Export generated for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepExport {
    pub step: String,
    pub kind: StepKind,
    pub export_name: String,
    pub closure: String,
}

impl StepExport {
    pub fn declaration(&self) -> String {
        format!("export const {} = {};", self.export_name, self.closure)
    }
}

/// Combined slice of every step: the trimmed module plus one export per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceOutput {
    /// Original text with every excluded statement excised.
    pub trimmed_text: String,
    /// One export per step, in declaration order.
    pub exports: Vec<StepExport>,
}

impl SliceOutput {
    pub fn export_name(&self, step: &str) -> Option<&str> {
        self.exports.iter().find(|e| e.step == step).map(|e| e.export_name.as_str())
    }

    /// `trimmed_text` followed by every step export.
    pub fn module_text(&self) -> String {
        compose(&self.trimmed_text, self.exports.iter())
    }
}

/// Standalone module for a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepModule {
    pub step: String,
    pub kind: StepKind,
    pub export_name: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Slicer {
    convention: ResolverConvention,
}

impl Slicer {
    pub fn new(convention: ResolverConvention) -> Self {
        Self { convention }
    }

    pub fn slice(&self, text: &str, steps: &[Step]) -> Result<SliceOutput, SliceError> {
        let module = ParsedModule::parse(text, "bundled module")?;
        Ok(self.analyze(&module, steps)?.combined())
    }

    pub fn slice_per_step(&self, text: &str, steps: &[Step]) -> Result<Vec<StepModule>, SliceError> {
        let module = ParsedModule::parse(text, "bundled module")?;
        Ok(self.analyze(&module, steps)?.per_step())
    }

    /// Run removal and reachability once; both output shapes derive from it.
    pub fn analyze<'m>(
        &self,
        module: &'m ParsedModule,
        steps: &[Step],
    ) -> Result<SliceAnalysis<'m>, SliceError> {
        let mut seen = HashSet::new();
        if let Some(dup) = steps.iter().find(|s| !seen.insert(s.name.as_str())) {
            return Err(SliceError::DuplicateStep(dup.name.clone()));
        }

        let graph = StatementGraph::build(module.statements().iter().map(|s| StatementEdges {
            defines: s.defines.clone(),
            references: s.references.clone(),
            mutates: s.mutates.clone(),
        }));
        let (seed_statements, seed_symbols) = self.removal_seeds(module, &graph);
        let removal = graph.propagate_removal(&seed_statements, &seed_symbols);

        let mut taken: HashSet<String> =
            module.top_level_names().into_iter().map(str::to_string).collect();
        let mut reached = Vec::with_capacity(steps.len());
        for step in steps {
            let closure = locate_closure(module, step)?;
            let roots: Vec<SymbolId> = free_identifiers(closure, module.source())
                .iter()
                .filter_map(|name| graph.symbol(name))
                .collect();
            let reach = graph.reachable(&roots, &removal);
            if let Some(&sym) = reach.gone_reached.first() {
                return Err(SliceError::RemovedReference {
                    step: step.name.clone(),
                    symbol: graph.symbol_name(sym).to_string(),
                });
            }
            let export = StepExport {
                step: step.name.clone(),
                kind: step.kind,
                export_name: export_name(&step.name, &mut taken),
                closure: module.text(closure).to_string(),
            };
            reached.push((export, reach));
        }

        debug!(
            module = module.label(),
            statements = graph.statement_count(),
            removed = removal.removed_statements().len(),
            passes = removal.steps(),
            steps = reached.len(),
            "computed slice"
        );
        Ok(SliceAnalysis { module, removal, reached })
    }

    /// Framework imports and the public entrypoint exports.
    fn removal_seeds(
        &self,
        module: &ParsedModule,
        graph: &StatementGraph,
    ) -> (Vec<usize>, Vec<SymbolId>) {
        let mut statements = Vec::new();
        let mut symbols = Vec::new();
        for stmt in module.statements() {
            match &stmt.kind {
                StatementKind::Import(info) if self.convention.is_framework(&info.source) => {
                    statements.push(stmt.index);
                    symbols.extend(info.bindings.iter().filter_map(|b| graph.symbol(&b.local)));
                }
                StatementKind::ExportDefault
                | StatementKind::ExportClause { .. }
                | StatementKind::ExportAll { .. } => statements.push(stmt.index),
                _ => {}
            }
        }
        (statements, symbols)
    }
}

/// Result of removal plus per-step reachability over one module.
#[derive(Debug)]
pub struct SliceAnalysis<'m> {
    module: &'m ParsedModule,
    removal: RemovalSet,
    reached: Vec<(StepExport, Reachability)>,
}

impl<'m> SliceAnalysis<'m> {
    pub fn removal(&self) -> &RemovalSet {
        &self.removal
    }

    pub fn exports(&self) -> impl Iterator<Item = &StepExport> {
        self.reached.iter().map(|(export, _)| export)
    }

    /// Statements kept by at least one step.
    pub fn combined(&self) -> SliceOutput {
        let mut union: Option<Reachability> = None;
        for (_, reach) in &self.reached {
            match union.as_mut() {
                Some(all) => all.merge(reach),
                None => union = Some(reach.clone()),
            }
        }
        let trimmed_text = excise(self.module.source(), self.module.statements(), |index| {
            union.as_ref().is_some_and(|all| all.is_kept(index))
        });
        SliceOutput { trimmed_text, exports: self.exports().cloned().collect() }
    }

    /// One module per step holding only what that step reaches.
    pub fn per_step(&self) -> Vec<StepModule> {
        self.reached
            .iter()
            .map(|(export, reach)| {
                let trimmed =
                    excise(self.module.source(), self.module.statements(), |i| reach.is_kept(i));
                StepModule {
                    step: export.step.clone(),
                    kind: export.kind,
                    export_name: export.export_name.clone(),
                    text: compose(&trimmed, std::iter::once(export)),
                }
            })
            .collect()
    }
}

fn compose<'a>(trimmed: &str, exports: impl Iterator<Item = &'a StepExport>) -> String {
    let mut out = trimmed.trim_end().to_string();
    if !out.is_empty() {
        out.push('\n');
    }
    for export in exports {
        out.push_str(&export.declaration());
        out.push('\n');
    }
    out
}

/// Cut excluded statements (and the line break right after each) out of `text`.
fn excise(text: &str, statements: &[TopLevelStatement], keep: impl Fn(usize) -> bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for stmt in statements {
        if keep(stmt.index) || stmt.range.end <= cursor {
            continue;
        }
        out.push_str(&text[cursor..stmt.range.start.max(cursor)]);
        let rest = &text[stmt.range.end..];
        cursor = stmt.range.end
            + if rest.starts_with("\r\n") {
                2
            } else if rest.starts_with('\n') {
                1
            } else {
                0
            };
    }
    out.push_str(&text[cursor..]);
    out
}

/// Find the function node for a step closure.
///
/// The recorded byte range wins when it still matches the text; otherwise
/// every literal occurrence is tried in order.
fn locate_closure<'m>(module: &'m ParsedModule, step: &Step) -> Result<Node<'m>, SliceError> {
    let source = module.source();
    let mut candidates: Vec<Range<usize>> = Vec::new();
    if let Some(range) = &step.closure_range {
        if source.get(range.clone()) == Some(step.closure.as_str()) {
            candidates.push(range.clone());
        }
    }
    if !step.closure.is_empty() {
        candidates.extend(
            source.match_indices(step.closure.as_str()).map(|(at, m)| at..at + m.len()),
        );
    }
    if candidates.is_empty() {
        return Err(SliceError::ClosureNotFound {
            step: step.name.clone(),
            label: module.label().to_string(),
        });
    }
    candidates
        .iter()
        .find_map(|range| function_at(module.root(), range))
        .ok_or_else(|| SliceError::NotAFunction {
            step: step.name.clone(),
            label: module.label().to_string(),
        })
}

fn function_at<'t>(root: Node<'t>, range: &Range<usize>) -> Option<Node<'t>> {
    let mut node = root.descendant_for_byte_range(range.start, range.end)?;
    loop {
        if node.byte_range() == *range && is_function_like(node.kind()) {
            return Some(node);
        }
        match node.parent() {
            Some(parent) if parent.byte_range() == *range => node = parent,
            _ => return None,
        }
    }
}

/// `__step_<name>` with non-identifier characters replaced, suffixed until unique.
pub fn export_name(step: &str, taken: &mut HashSet<String>) -> String {
    let sanitized: String = step
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    let base = format!("{STEP_EXPORT_PREFIX}{sanitized}");
    let mut candidate = base.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}
