//! Dependency tracking and execution ordering for calculators

use crate::ast::FormulaExpr;
use crate::parser::parse_formula;
use ahash::{AHashMap, AHashSet};
use calcsmith_core::{Calculator, FieldKind};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Dependency graph over the nodes (fields and formulas) of one calculator
///
/// Nodes are numbered in tie-break order, so iterating indices or the
/// ordered precedent sets is deterministic.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index: AHashMap<String, usize>,
    /// Node → nodes it depends on (precedents)
    precedents: Vec<BTreeSet<usize>>,
    /// Node → nodes that depend on it (dependents)
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its index; re-adding a name returns the first index
    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.precedents.push(BTreeSet::new());
        self.dependents.push(BTreeSet::new());
        idx
    }

    /// Add a dependency: dependent depends on precedent
    ///
    /// Returns false if either node is unknown.
    pub fn add_dependency(&mut self, precedent: &str, dependent: &str) -> bool {
        match (self.index.get(precedent), self.index.get(dependent)) {
            (Some(&p), Some(&d)) => {
                self.precedents[d].insert(p);
                self.dependents[p].insert(d);
                true
            }
            _ => false,
        }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes the given node depends on, in tie-break order
    pub fn precedents(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        self.index
            .get(name)
            .into_iter()
            .flat_map(move |&idx| self.precedents[idx].iter())
            .map(move |&p| self.nodes[p].as_str())
    }

    /// Nodes that depend directly on the given node, in tie-break order
    pub fn dependents(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        self.index
            .get(name)
            .into_iter()
            .flat_map(move |&idx| self.dependents[idx].iter())
            .map(move |&d| self.nodes[d].as_str())
    }

    /// Depth-first topological sort
    ///
    /// Returns the order (every node after all of its precedents) and every
    /// cycle met on the way, each as the path that closes it. When cycles
    /// exist the order is empty.
    pub fn sort(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut walk = Walk {
            graph: self,
            state: vec![VisitState::None; self.nodes.len()],
            path: Vec::new(),
            order: Vec::with_capacity(self.nodes.len()),
            cycles: Vec::new(),
            seen_cycles: AHashSet::new(),
        };

        // Visit every node so disconnected ones are ordered too
        for idx in 0..self.nodes.len() {
            if walk.state[idx] == VisitState::None {
                walk.visit(idx);
            }
        }

        if !walk.cycles.is_empty() {
            return (Vec::new(), walk.cycles);
        }
        let order = walk
            .order
            .into_iter()
            .map(|idx| self.nodes[idx].clone())
            .collect();
        (order, Vec::new())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

struct Walk<'g> {
    graph: &'g DependencyGraph,
    state: Vec<VisitState>,
    path: Vec<usize>,
    order: Vec<usize>,
    cycles: Vec<Vec<String>>,
    seen_cycles: AHashSet<Vec<usize>>,
}

impl Walk<'_> {
    fn visit(&mut self, idx: usize) {
        match self.state[idx] {
            VisitState::Visited => return,
            VisitState::Visiting => {
                self.record_cycle(idx);
                return;
            }
            VisitState::None => self.state[idx] = VisitState::Visiting,
        }

        self.path.push(idx);
        // Recurse on dependencies first
        for &precedent in &self.graph.precedents[idx] {
            self.visit(precedent);
        }
        self.path.pop();

        self.state[idx] = VisitState::Visited;
        self.order.push(idx);
    }

    fn record_cycle(&mut self, closing: usize) {
        let start = match self.path.iter().position(|&n| n == closing) {
            Some(start) => start,
            None => return,
        };
        // Each step on the path is "references the next"
        let cycle: Vec<usize> = self.path[start..].to_vec();

        // Same cycle entered at a different node is the same cycle
        let mut key = cycle.clone();
        if let Some(min_pos) = key.iter().enumerate().min_by_key(|(_, n)| **n).map(|(i, _)| i) {
            key.rotate_left(min_pos);
        }
        if !self.seen_cycles.insert(key) {
            return;
        }

        let mut names: Vec<String> = cycle
            .iter()
            .map(|&n| self.graph.nodes[n].clone())
            .collect();
        names.push(self.graph.nodes[closing].clone());
        self.cycles.push(names);
    }
}

/// Result of resolving a calculator's dependencies
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Resolution {
    /// Execution order; empty when cycles exist
    pub order: Vec<String>,
    /// Each distinct cycle as a closed path, e.g. `["A", "B", "A"]`
    pub cycles: Vec<Vec<String>>,
    /// Direct dependencies of each node
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl Resolution {
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Resolve the execution order of a calculator
///
/// Expressions that do not parse contribute no edges; the validator reports
/// them.
pub fn resolve(calc: &Calculator) -> Resolution {
    let mut parsed = AHashMap::new();
    for (name, expression) in expressions(calc) {
        if let Ok(expr) = parse_formula(expression) {
            parsed.entry(name.to_string()).or_insert(expr);
        }
    }
    resolve_with(calc, &parsed)
}

/// Resolve using already-parsed expressions, keyed by node name
pub fn resolve_with(calc: &Calculator, parsed: &AHashMap<String, FormulaExpr>) -> Resolution {
    let graph = build_graph(calc, parsed);
    let (order, cycles) = graph.sort();

    let dependencies = graph
        .nodes
        .iter()
        .map(|name| {
            let deps = graph.precedents(name).map(str::to_string).collect();
            (name.clone(), deps)
        })
        .collect();

    debug!(
        "resolved calculator '{}': {} nodes, {} cycles",
        calc.id,
        graph.len(),
        cycles.len()
    );

    Resolution {
        order,
        cycles,
        dependencies,
    }
}

/// Build the graph with nodes in tie-break order: fields first in
/// declaration order, then formulas by `(execution_order, declaration index)`
pub fn build_graph(calc: &Calculator, parsed: &AHashMap<String, FormulaExpr>) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for field in &calc.fields {
        graph.add_node(&field.name);
    }
    let mut formulas: Vec<(usize, &calcsmith_core::Formula)> =
        calc.formulas.iter().enumerate().collect();
    formulas.sort_by_key(|(idx, formula)| (formula.execution_order, *idx));
    for (_, formula) in &formulas {
        graph.add_node(&formula.name);
    }

    for (name, _) in expressions(calc) {
        if let Some(expr) = parsed.get(name) {
            expr.for_each_reference(&mut |reference| {
                graph.add_dependency(reference, name);
            });
        }
    }

    graph
}

/// Every node that carries an expression: calculated fields, then formulas
pub(crate) fn expressions(calc: &Calculator) -> impl Iterator<Item = (&str, &str)> {
    let fields = calc
        .fields
        .iter()
        .filter(|f| f.kind == FieldKind::Calculated)
        .filter_map(|f| f.expression_text().map(|expr| (f.name.as_str(), expr)));
    let formulas = calc
        .formulas
        .iter()
        .map(|f| (f.name.as_str(), f.expression.as_str()));
    fields.chain(formulas)
}
