//! core::graph
//!
//! Operation dependency graph.
//!
//! # Architecture
//!
//! The operation graph is a DAG where:
//! - Nodes are planned operations
//! - Edges point from an operation to the operations it depends on
//! - Roots are operations with no dependencies (e.g. DNS record upserts)
//!
//! # Invariants
//!
//! - Graph must be acyclic (the planner asserts this before execution)
//! - Topological order is deterministic: ready nodes release in insertion
//!   order, so the same plan always executes the same way

use std::collections::{HashMap, HashSet, VecDeque};

use crate::core::types::OpId;

/// Dependency graph over planned operations.
///
/// This is an in-memory representation built while the planner emits
/// operations; nodes keep their insertion order.
#[derive(Debug, Default)]
pub struct OpGraph {
    /// Nodes in insertion order.
    nodes: Vec<OpId>,
    /// Dependencies of each node (edges node -> dependency).
    deps: HashMap<OpId, Vec<OpId>>,
    /// Reverse edges (dependency -> dependents).
    dependents: HashMap<OpId, Vec<OpId>>,
}

impl OpGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no dependencies.
    ///
    /// Adding the same node twice is a no-op.
    pub fn add_node(&mut self, op: OpId) {
        if !self.deps.contains_key(&op) {
            self.deps.insert(op.clone(), Vec::new());
            self.nodes.push(op);
        }
    }

    /// Add a dependency edge: `op` must not run before `dependency` succeeds.
    ///
    /// Both nodes are created if missing. Duplicate edges are ignored.
    pub fn add_edge(&mut self, op: OpId, dependency: OpId) {
        self.add_node(op.clone());
        self.add_node(dependency.clone());
        let deps = self.deps.get_mut(&op).expect("node just added");
        if !deps.contains(&dependency) {
            deps.push(dependency.clone());
            self.dependents.entry(dependency).or_default().push(op);
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of an operation.
    pub fn dependencies(&self, op: &OpId) -> &[OpId] {
        self.deps.get(op).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct dependents of an operation.
    pub fn direct_dependents(&self, op: &OpId) -> &[OpId] {
        self.dependents.get(op).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All transitive dependents of an operation (excluding itself).
    ///
    /// Used to cascade a permanent failure to everything downstream.
    pub fn transitive_dependents(&self, op: &OpId) -> Vec<OpId> {
        let mut seen: HashSet<OpId> = HashSet::new();
        let mut queue: VecDeque<OpId> = VecDeque::new();
        queue.push_back(op.clone());
        let mut out = Vec::new();
        while let Some(current) = queue.pop_front() {
            for dependent in self.direct_dependents(&current) {
                if seen.insert(dependent.clone()) {
                    out.push(dependent.clone());
                    queue.push_back(dependent.clone());
                }
            }
        }
        out
    }

    /// Compute a deterministic topological order.
    ///
    /// Kahn's algorithm with a FIFO frontier seeded in insertion order.
    /// Returns `None` if the graph contains a cycle.
    pub fn topo_order(&self) -> Option<Vec<OpId>> {
        let mut in_degree: HashMap<&OpId, usize> = self
            .nodes
            .iter()
            .map(|op| (op, self.dependencies(op).len()))
            .collect();

        let mut frontier: VecDeque<&OpId> = self
            .nodes
            .iter()
            .filter(|op| in_degree[*op] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(op) = frontier.pop_front() {
            order.push(op.clone());
            for dependent in self.direct_dependents(op) {
                let degree = in_degree.get_mut(dependent).expect("known node");
                *degree -= 1;
                if *degree == 0 {
                    frontier.push_back(dependent);
                }
            }
        }

        if order.len() == self.nodes.len() {
            Some(order)
        } else {
            None
        }
    }

    /// Check whether the graph contains a cycle.
    pub fn has_cycle(&self) -> bool {
        self.topo_order().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(s: &str) -> OpId {
        OpId::new(s)
    }

    #[test]
    fn topo_order_respects_dependencies() {
        let mut g = OpGraph::new();
        g.add_node(op("record/a"));
        g.add_edge(op("bind/a"), op("deploy/a"));
        g.add_edge(op("cert/a"), op("bind/a"));
        g.add_node(op("deploy/a"));

        let order = g.topo_order().unwrap();
        let pos = |id: &str| order.iter().position(|o| o.as_str() == id).unwrap();
        assert!(pos("deploy/a") < pos("bind/a"));
        assert!(pos("bind/a") < pos("cert/a"));
    }

    #[test]
    fn topo_order_is_deterministic() {
        let build = || {
            let mut g = OpGraph::new();
            g.add_node(op("record/b"));
            g.add_node(op("record/a"));
            g.add_edge(op("bind/b"), op("record/b"));
            g.add_edge(op("bind/a"), op("record/a"));
            g
        };
        let first = build().topo_order().unwrap();
        let second = build().topo_order().unwrap();
        assert_eq!(first, second);
        // Insertion order breaks ties.
        assert_eq!(first[0].as_str(), "record/b");
        assert_eq!(first[1].as_str(), "record/a");
    }

    #[test]
    fn cycle_is_detected() {
        let mut g = OpGraph::new();
        g.add_edge(op("a"), op("b"));
        g.add_edge(op("b"), op("c"));
        g.add_edge(op("c"), op("a"));
        assert!(g.has_cycle());
        assert!(g.topo_order().is_none());
    }

    #[test]
    fn transitive_dependents_cascade() {
        let mut g = OpGraph::new();
        g.add_edge(op("bind/a"), op("deploy/a"));
        g.add_edge(op("cert/a"), op("bind/a"));
        g.add_edge(op("bind/b"), op("deploy/b"));

        let downstream = g.transitive_dependents(&op("deploy/a"));
        let names: Vec<&str> = downstream.iter().map(|o| o.as_str()).collect();
        assert!(names.contains(&"bind/a"));
        assert!(names.contains(&"cert/a"));
        assert!(!names.contains(&"bind/b"));
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut g = OpGraph::new();
        g.add_edge(op("b"), op("a"));
        g.add_edge(op("b"), op("a"));
        assert_eq!(g.dependencies(&op("b")).len(), 1);
        assert_eq!(g.direct_dependents(&op("a")).len(), 1);
    }
}
