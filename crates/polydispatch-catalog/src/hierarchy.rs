//! Hierarchy graph - inheritance, conformance and interface extension edges.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: `TypeHash` (registered types and forward references)
//! - Edges: derived → base for `Inherits`, type → interface for `Conforms`,
//!   interface → extended interface for `Extends`
//!
//! Edges are only inserted after [`HierarchyGraph::find_cycle`] has confirmed
//! that none of them closes a cycle, so the graph stays acyclic.

use petgraph::Direction;
use petgraph::algo::{astar, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use polydispatch_core::TypeHash;
use rustc_hash::FxHashMap;

/// Relationship carried by a hierarchy edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Class → base class.
    Inherits,
    /// Class, value type or generic placeholder → interface.
    Conforms,
    /// Interface → extended interface.
    Extends,
}

/// Directed acyclic graph of hierarchy edges.
#[derive(Debug, Default)]
pub struct HierarchyGraph {
    graph: DiGraph<TypeHash, EdgeKind>,
    nodes: FxHashMap<TypeHash, NodeIndex>,
}

impl HierarchyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, hash: TypeHash) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(&hash) {
            return idx;
        }
        let idx = self.graph.add_node(hash);
        self.nodes.insert(hash, idx);
        idx
    }

    /// Check whether adding edges `from → target` for every target would
    /// close a cycle.
    ///
    /// Returns the offending cycle as `[from, target, ..., from]`.
    pub fn find_cycle(&self, from: TypeHash, targets: &[TypeHash]) -> Option<Vec<TypeHash>> {
        for &target in targets {
            if target == from {
                return Some(vec![from, from]);
            }
            let (Some(&start), Some(&goal)) = (self.nodes.get(&target), self.nodes.get(&from))
            else {
                continue;
            };
            if let Some((_, path)) = astar(&self.graph, start, |n| n == goal, |_| 1u32, |_| 0u32)
            {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(from);
                cycle.extend(path.into_iter().map(|idx| self.graph[idx]));
                return Some(cycle);
            }
        }
        None
    }

    /// Insert edges from `from`. Call [`find_cycle`](Self::find_cycle) first.
    pub fn add_edges(&mut self, from: TypeHash, edges: &[(TypeHash, EdgeKind)]) {
        let source = self.node(from);
        for &(target, kind) in edges {
            let target = self.node(target);
            self.graph.add_edge(source, target, kind);
        }
    }

    /// Edges pointing at `hash` from already-known types.
    pub fn incoming(&self, hash: TypeHash) -> Vec<(TypeHash, EdgeKind)> {
        let Some(&idx) = self.nodes.get(&hash) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|edge| (self.graph[edge.source()], *edge.weight()))
            .collect()
    }

    /// Edges leaving `hash`.
    pub fn outgoing(&self, hash: TypeHash) -> Vec<(TypeHash, EdgeKind)> {
        let Some(&idx) = self.nodes.get(&hash) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (self.graph[edge.target()], *edge.weight()))
            .collect()
    }

    /// Every node ordered so that bases and interfaces precede the types
    /// that depend on them.
    ///
    /// Returns the node that sits on a cycle if the graph is not acyclic.
    pub fn dependency_order(&self) -> Result<Vec<TypeHash>, TypeHash> {
        let mut order = toposort(&self.graph, None).map_err(|cycle| self.graph[cycle.node_id()])?;
        order.reverse();
        Ok(order.into_iter().map(|idx| self.graph[idx]).collect())
    }

    /// Number of nodes (including forward references).
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
