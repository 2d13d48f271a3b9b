//! Bipartite statement ↔ symbol graph.
//!
//! Statements and symbols are dense integer ids. Edges are "defines",
//! "references" and "mutates"; each is indexed in both directions so removal
//! propagation and reachability are plain worklist traversals.

use std::collections::{HashMap, VecDeque};

pub type StatementId = usize;
pub type SymbolId = usize;

/// Names one statement defines, references and mutates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementEdges {
    pub defines: Vec<String>,
    pub references: Vec<String>,
    pub mutates: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StatementGraph {
    symbols: Vec<String>,
    symbol_ids: HashMap<String, SymbolId>,
    defines: Vec<Vec<SymbolId>>,
    references: Vec<Vec<SymbolId>>,
    mutates: Vec<Vec<SymbolId>>,
    defined_by: Vec<Vec<StatementId>>,
    referenced_by: Vec<Vec<StatementId>>,
    mutated_by: Vec<Vec<StatementId>>,
}

impl StatementGraph {
    /// Build the graph. Symbols are the defined names only; references to
    /// anything not defined in the module (globals) carry no edge.
    pub fn build<I>(statements: I) -> Self
    where
        I: IntoIterator<Item = StatementEdges>,
    {
        let statements: Vec<StatementEdges> = statements.into_iter().collect();
        let mut graph = StatementGraph::default();

        for edges in &statements {
            let ids = edges.defines.iter().map(|name| graph.intern(name)).collect::<Vec<_>>();
            graph.defines.push(dedup(ids));
        }
        for edges in &statements {
            let refs = edges.references.iter().filter_map(|n| graph.symbol(n)).collect();
            let muts = edges.mutates.iter().filter_map(|n| graph.symbol(n)).collect();
            graph.references.push(dedup(refs));
            graph.mutates.push(dedup(muts));
        }

        let symbol_count = graph.symbols.len();
        graph.defined_by = vec![Vec::new(); symbol_count];
        graph.referenced_by = vec![Vec::new(); symbol_count];
        graph.mutated_by = vec![Vec::new(); symbol_count];
        for stmt in 0..statements.len() {
            for &sym in &graph.defines[stmt] {
                graph.defined_by[sym].push(stmt);
            }
            for &sym in &graph.references[stmt] {
                graph.referenced_by[sym].push(stmt);
            }
            for &sym in &graph.mutates[stmt] {
                graph.mutated_by[sym].push(stmt);
            }
        }
        graph
    }

    fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.symbol_ids.get(name) {
            return id;
        }
        let id = self.symbols.len();
        self.symbols.push(name.to_string());
        self.symbol_ids.insert(name.to_string(), id);
        id
    }

    pub fn symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbol_ids.get(name).copied()
    }

    pub fn symbol_name(&self, id: SymbolId) -> &str {
        &self.symbols[id]
    }

    pub fn statement_count(&self) -> usize {
        self.defines.len()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn defines(&self, stmt: StatementId) -> &[SymbolId] {
        &self.defines[stmt]
    }

    pub fn references(&self, stmt: StatementId) -> &[SymbolId] {
        &self.references[stmt]
    }

    /// Mark `seed_statements` removed and `seed_symbols` gone, then propagate
    /// to a fixed point: any statement referencing a gone symbol is removed,
    /// and everything a removed statement defines is gone.
    pub fn propagate_removal(
        &self,
        seed_statements: &[StatementId],
        seed_symbols: &[SymbolId],
    ) -> RemovalSet {
        let mut set = RemovalSet {
            removed: vec![false; self.statement_count()],
            gone: vec![false; self.symbol_count()],
            order: Vec::new(),
            steps: 0,
        };
        let mut worklist = VecDeque::new();

        for &sym in seed_symbols {
            set.mark_gone(sym, &mut worklist);
        }
        for &stmt in seed_statements {
            self.remove(stmt, &mut set, &mut worklist);
        }
        while let Some(sym) = worklist.pop_front() {
            set.steps += 1;
            for &stmt in &self.referenced_by[sym] {
                self.remove(stmt, &mut set, &mut worklist);
            }
        }
        set
    }

    fn remove(&self, stmt: StatementId, set: &mut RemovalSet, worklist: &mut VecDeque<SymbolId>) {
        if set.removed[stmt] {
            return;
        }
        set.removed[stmt] = true;
        set.order.push(stmt);
        for &sym in &self.defines[stmt] {
            set.mark_gone(sym, worklist);
        }
    }

    /// Statements needed to evaluate code that references `roots`.
    ///
    /// Walks symbol → defining/mutating statements → their references.
    /// Removed statements are never kept; gone symbols met on the way are
    /// reported in `gone_reached`.
    pub fn reachable(&self, roots: &[SymbolId], removal: &RemovalSet) -> Reachability {
        let mut kept = vec![false; self.statement_count()];
        let mut visited = vec![false; self.symbol_count()];
        let mut gone_reached = Vec::new();
        let mut worklist: VecDeque<SymbolId> = roots.iter().copied().collect();

        while let Some(sym) = worklist.pop_front() {
            if std::mem::replace(&mut visited[sym], true) {
                continue;
            }
            if removal.is_gone(sym) {
                gone_reached.push(sym);
                continue;
            }
            for &stmt in self.defined_by[sym].iter().chain(&self.mutated_by[sym]) {
                if removal.is_removed(stmt) || kept[stmt] {
                    continue;
                }
                kept[stmt] = true;
                worklist.extend(self.references[stmt].iter().copied());
            }
        }
        Reachability { kept, gone_reached }
    }
}

fn dedup(mut ids: Vec<usize>) -> Vec<usize> {
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    ids
}

/// Monotonically grown removal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalSet {
    removed: Vec<bool>,
    gone: Vec<bool>,
    /// Statements in the order they were removed.
    order: Vec<StatementId>,
    /// Worklist items processed before the fixed point.
    steps: usize,
}

impl RemovalSet {
    fn mark_gone(&mut self, sym: SymbolId, worklist: &mut VecDeque<SymbolId>) {
        if !self.gone[sym] {
            self.gone[sym] = true;
            worklist.push_back(sym);
        }
    }

    pub fn is_removed(&self, stmt: StatementId) -> bool {
        self.removed.get(stmt).copied().unwrap_or(false)
    }

    pub fn is_gone(&self, sym: SymbolId) -> bool {
        self.gone.get(sym).copied().unwrap_or(false)
    }

    pub fn removed_statements(&self) -> &[StatementId] {
        &self.order
    }

    pub fn gone_symbols(&self) -> Vec<SymbolId> {
        self.gone.iter().enumerate().filter(|(_, g)| **g).map(|(i, _)| i).collect()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    kept: Vec<bool>,
    pub gone_reached: Vec<SymbolId>,
}

impl Reachability {
    pub fn is_kept(&self, stmt: StatementId) -> bool {
        self.kept.get(stmt).copied().unwrap_or(false)
    }

    pub fn kept_statements(&self) -> Vec<StatementId> {
        self.kept.iter().enumerate().filter(|(_, k)| **k).map(|(i, _)| i).collect()
    }

    /// Union with another reachability over the same graph.
    pub fn merge(&mut self, other: &Reachability) {
        for (mine, theirs) in self.kept.iter_mut().zip(&other.kept) {
            *mine |= *theirs;
        }
        for sym in &other.gone_reached {
            if !self.gone_reached.contains(sym) {
                self.gone_reached.push(*sym);
            }
        }
    }
}
