use crate::core::account::AccountId;
use crate::core::error::{DetectionError, Result};
use crate::core::transaction::TransactionEdge;
use crate::graph::budget::Deadline;
use crate::graph::transaction_graph::TransactionGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A simple cycle together with the concrete edges that form it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedWalk {
    /// Closed node sequence, first == last.
    pub nodes: Vec<AccountId>,
    /// One edge per hop, in walk order.
    pub edges: Vec<TransactionEdge>,
}

impl ClosedWalk {
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    pub fn origin(&self) -> &AccountId {
        &self.nodes[0]
    }

    /// Accounts on the walk without the closing repeat.
    pub fn accounts(&self) -> &[AccountId] {
        &self.nodes[..self.nodes.len() - 1]
    }

    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(TransactionEdge::weight).sum()
    }
}

/// Check a hop range the way every path query expects it.
pub fn validate_hop_range(min_hops: usize, max_hops: usize) -> Result<()> {
    if min_hops == 0 {
        return Err(DetectionError::invalid_input("min_hops must be at least 1"));
    }
    if min_hops > max_hops {
        return Err(DetectionError::invalid_input(format!(
            "min_hops {} exceeds max_hops {}",
            min_hops, max_hops
        )));
    }
    Ok(())
}

/// Enumerate every simple cycle whose hop count lies in `min_hops..=max_hops`.
///
/// Each cycle is rooted at its smallest account and only extended through
/// larger ones, so a cycle is reported once rather than once per rotation.
/// Parallel edges produce distinct walks, one per edge combination.
///
/// The number of simple cycles is exponential in the worst case; `deadline`
/// bounds the search.
pub fn enumerate_closed_paths(
    graph: &TransactionGraph,
    min_hops: usize,
    max_hops: usize,
    deadline: &Deadline,
) -> Result<Vec<ClosedWalk>> {
    validate_hop_range(min_hops, max_hops)?;

    let mut walks = Vec::new();
    for start in graph.nodes() {
        let mut search = Search {
            graph,
            start: &start,
            min_hops,
            max_hops,
            nodes: vec![start.clone()],
            edges: Vec::new(),
            on_path: HashSet::from([start.clone()]),
            walks: &mut walks,
        };
        search.extend(&start, deadline)?;
    }
    Ok(walks)
}

struct Search<'g, 'w> {
    graph: &'g TransactionGraph,
    start: &'g AccountId,
    min_hops: usize,
    max_hops: usize,
    nodes: Vec<AccountId>,
    edges: Vec<TransactionEdge>,
    on_path: HashSet<AccountId>,
    walks: &'w mut Vec<ClosedWalk>,
}

impl Search<'_, '_> {
    fn extend(&mut self, current: &AccountId, deadline: &Deadline) -> Result<()> {
        deadline.check()?;
        let graph = self.graph;
        let start = self.start;
        let hops = self.edges.len() + 1;

        for edge in graph.neighbors(current) {
            let next = edge.to();
            if next == start {
                if hops >= self.min_hops && hops <= self.max_hops {
                    let mut nodes = self.nodes.clone();
                    nodes.push(next.clone());
                    let mut edges = self.edges.clone();
                    edges.push(edge.clone());
                    self.walks.push(ClosedWalk { nodes, edges });
                }
            } else if next > start && hops < self.max_hops && !self.on_path.contains(next) {
                self.nodes.push(next.clone());
                self.edges.push(edge.clone());
                self.on_path.insert(next.clone());

                self.extend(next, deadline)?;

                self.on_path.remove(next);
                self.edges.pop();
                self.nodes.pop();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc(id: &str) -> AccountId {
        AccountId::new(id)
    }

    fn graph_of(edges: &[(&str, &str, f64)]) -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        for (from, to, w) in edges {
            graph.add_edge(acc(from), acc(to), *w);
        }
        graph
    }

    fn walks(graph: &TransactionGraph, min: usize, max: usize) -> Vec<ClosedWalk> {
        enumerate_closed_paths(graph, min, max, &Deadline::none("test")).unwrap()
    }

    #[test]
    fn test_square_reported_once() {
        let graph = graph_of(&[
            ("A", "B", 30_000.0),
            ("B", "C", 30_000.0),
            ("C", "D", 30_000.0),
            ("D", "A", 30_000.0),
        ]);
        let found = walks(&graph, 2, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hop_count(), 4);
        assert_eq!(found[0].origin(), &acc("A"));
        assert_eq!(found[0].total_weight(), 120_000.0);
    }

    #[test]
    fn test_overlapping_cycles_all_found() {
        let graph = graph_of(&[
            ("A", "B", 1.0),
            ("A", "C", 1.0),
            ("B", "D", 1.0),
            ("C", "D", 1.0),
            ("D", "A", 1.0),
        ]);
        assert_eq!(walks(&graph, 2, 10).len(), 2);
    }

    #[test]
    fn test_hop_bounds() {
        let graph = graph_of(&[("A", "B", 1.0), ("B", "A", 1.0), ("B", "C", 1.0), ("C", "A", 1.0)]);
        assert_eq!(walks(&graph, 2, 10).len(), 2);
        assert_eq!(walks(&graph, 3, 10).len(), 1);
        assert_eq!(walks(&graph, 2, 2).len(), 1);
    }

    #[test]
    fn test_parallel_edges_are_distinct_walks() {
        let graph = graph_of(&[("A", "B", 1.0), ("A", "B", 2.0), ("B", "A", 1.0)]);
        let found = walks(&graph, 2, 10);
        assert_eq!(found.len(), 2);
        assert_ne!(found[0].edges[0].id(), found[1].edges[0].id());
    }

    #[test]
    fn test_self_loop_needs_min_one() {
        let graph = graph_of(&[("A", "A", 1.0)]);
        assert!(walks(&graph, 2, 10).is_empty());
        assert_eq!(walks(&graph, 1, 10).len(), 1);
    }

    #[test]
    fn test_invalid_ranges() {
        let graph = TransactionGraph::new();
        let deadline = Deadline::none("test");
        assert!(enumerate_closed_paths(&graph, 0, 3, &deadline).is_err());
        assert!(enumerate_closed_paths(&graph, 5, 3, &deadline).is_err());
    }
}
