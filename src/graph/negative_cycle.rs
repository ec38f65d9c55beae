//! Negative-cycle detection over weighted transaction edges.
//!
//! A cycle whose weights sum below zero means value is created by going
//! around the loop (arbitrage, or money effectively appearing from nowhere).
//! This is a different signal from plain cycle existence.
//!
//! - [`FloydWarshall`] computes all-pairs shortest paths in O(V³). It is gated
//!   by [`ComputeBudget::dense_max_nodes`].
//! - [`BellmanFord`] checks a single source in O(V·E).

use crate::core::account::AccountId;
use crate::core::error::{DetectionError, Result};
use crate::core::transaction::TransactionEdge;
use crate::graph::budget::ComputeBudget;
use crate::graph::transaction_graph::TransactionGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const FW_ENGINE: &str = "floyd-warshall";
const BF_ENGINE: &str = "bellman-ford";

/// Map each account to a dense index, rejecting duplicates.
fn index_nodes(nodes: &[AccountId]) -> Result<HashMap<AccountId, usize>> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.clone(), i).is_some() {
            return Err(DetectionError::invalid_input(format!(
                "duplicate account in node list: {}",
                node
            )));
        }
    }
    Ok(index)
}

fn resolve(index: &HashMap<AccountId, usize>, account: &AccountId) -> Result<usize> {
    index.get(account).copied().ok_or_else(|| {
        DetectionError::invalid_input(format!("edge references unknown account {}", account))
    })
}

/// All-pairs shortest paths with negative-cycle detection.
///
/// # Examples
///
/// ```
/// use cycle_sentinel::prelude::*;
/// use cycle_sentinel::graph::negative_cycle::FloydWarshall;
///
/// let mut graph = TransactionGraph::new();
/// graph.add_edge(AccountId::new("A"), AccountId::new("B"), 1.0);
/// graph.add_edge(AccountId::new("B"), AccountId::new("C"), 1.0);
/// graph.add_edge(AccountId::new("C"), AccountId::new("A"), -3.0);
///
/// let fw = FloydWarshall::compute(&graph, &ComputeBudget::default()).unwrap();
/// assert!(fw.has_negative_cycle());
/// ```
#[derive(Debug, Clone)]
pub struct FloydWarshall {
    nodes: Vec<AccountId>,
    index: HashMap<AccountId, usize>,
    dist: Vec<Vec<f64>>,
    next: Vec<Vec<Option<usize>>>,
}

impl FloydWarshall {
    pub fn compute(graph: &TransactionGraph, budget: &ComputeBudget) -> Result<Self> {
        Self::from_parts(&graph.nodes(), graph.edges(), budget)
    }

    /// Run over an explicit node list. Edges must only reference listed nodes.
    pub fn from_parts<'a>(
        nodes: &[AccountId],
        edges: impl IntoIterator<Item = &'a TransactionEdge>,
        budget: &ComputeBudget,
    ) -> Result<Self> {
        let edges: Vec<&TransactionEdge> = edges.into_iter().collect();
        let n = nodes.len();
        let deadline = budget.admit_dense(n, edges.len(), FW_ENGINE)?;
        let index = index_nodes(nodes)?;

        let mut dist = vec![vec![f64::INFINITY; n]; n];
        let mut next = vec![vec![None; n]; n];
        for (i, row) in dist.iter_mut().enumerate() {
            row[i] = 0.0;
        }

        for edge in &edges {
            let u = resolve(&index, edge.from())?;
            let v = resolve(&index, edge.to())?;
            // Parallel edges: the cheapest one defines the direct distance
            if edge.weight() < dist[u][v] {
                dist[u][v] = edge.weight();
                next[u][v] = Some(v);
            }
        }

        for k in 0..n {
            deadline.check()?;
            for i in 0..n {
                let d_ik = dist[i][k];
                if d_ik == f64::INFINITY {
                    continue;
                }
                for j in 0..n {
                    let through_k = d_ik + dist[k][j];
                    if through_k < dist[i][j] {
                        dist[i][j] = through_k;
                        next[i][j] = next[i][k];
                    }
                }
            }
        }

        log::debug!("floyd-warshall relaxed {} accounts", n);
        Ok(Self {
            nodes: nodes.to_vec(),
            index,
            dist,
            next,
        })
    }

    /// True iff some account can reach itself at negative total cost.
    pub fn has_negative_cycle(&self) -> bool {
        (0..self.nodes.len()).any(|i| self.dist[i][i] < 0.0)
    }

    /// Accounts lying on (or able to loop through) a negative cycle.
    pub fn negative_cycle_nodes(&self) -> Vec<AccountId> {
        (0..self.nodes.len())
            .filter(|&i| self.dist[i][i] < 0.0)
            .map(|i| self.nodes[i].clone())
            .collect()
    }

    /// Shortest distance from `from` to `to`, `None` if unreachable or unknown.
    pub fn distance(&self, from: &AccountId, to: &AccountId) -> Option<f64> {
        let i = *self.index.get(from)?;
        let j = *self.index.get(to)?;
        let d = self.dist[i][j];
        d.is_finite().then_some(d)
    }

    /// Reconstruct a shortest path. Returns `None` when no path exists or the
    /// path is distorted by a negative cycle.
    pub fn path(&self, from: &AccountId, to: &AccountId) -> Option<Vec<AccountId>> {
        let mut i = *self.index.get(from)?;
        let j = *self.index.get(to)?;
        if i == j {
            return Some(vec![from.clone()]);
        }
        let mut path = vec![from.clone()];
        for _ in 0..self.nodes.len() {
            i = self.next[i][j]?;
            path.push(self.nodes[i].clone());
            if i == j {
                return Some(path);
            }
        }
        None
    }
}

/// Outcome of a single-source negative-cycle check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeCycleReport {
    pub source: AccountId,
    pub has_negative_cycle: bool,
    /// Targets of edges that still relax after |V|−1 rounds. A heuristic
    /// pointer into the cycle's neighbourhood, not its exact membership.
    pub affected_nodes: Vec<AccountId>,
}

/// Single-source Bellman–Ford relaxation.
pub struct BellmanFord;

impl BellmanFord {
    pub fn run(
        graph: &TransactionGraph,
        source: &AccountId,
        budget: &ComputeBudget,
    ) -> Result<NegativeCycleReport> {
        Self::from_parts(&graph.nodes(), graph.edges(), source, budget)
    }

    pub fn from_parts<'a>(
        nodes: &[AccountId],
        edges: impl IntoIterator<Item = &'a TransactionEdge>,
        source: &AccountId,
        budget: &ComputeBudget,
    ) -> Result<NegativeCycleReport> {
        let edges: Vec<&TransactionEdge> = edges.into_iter().collect();
        let deadline = budget.admit_counts(nodes.len(), edges.len(), BF_ENGINE)?;
        let index = index_nodes(nodes)?;
        let src = index.get(source).copied().ok_or_else(|| {
            DetectionError::invalid_input(format!("unknown source account {}", source))
        })?;

        // Resolve once so malformed edges fail before any relaxation
        let resolved: Vec<(usize, usize, f64)> = edges
            .iter()
            .map(|e| Ok((resolve(&index, e.from())?, resolve(&index, e.to())?, e.weight())))
            .collect::<Result<_>>()?;

        let mut dist = vec![f64::INFINITY; nodes.len()];
        dist[src] = 0.0;

        for _ in 1..nodes.len() {
            deadline.check()?;
            let mut changed = false;
            for &(u, v, w) in &resolved {
                if dist[u] != f64::INFINITY && dist[u] + w < dist[v] {
                    dist[v] = dist[u] + w;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut affected: Vec<AccountId> = resolved
            .iter()
            .filter(|&&(u, v, w)| dist[u] != f64::INFINITY && dist[u] + w < dist[v])
            .map(|&(_, v, _)| nodes[v].clone())
            .collect();
        affected.sort();
        affected.dedup();

        if !affected.is_empty() {
            log::info!(
                "negative cycle reachable from {} ({} affected accounts)",
                source,
                affected.len()
            );
        }

        Ok(NegativeCycleReport {
            source: source.clone(),
            has_negative_cycle: !affected.is_empty(),
            affected_nodes: affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn acc(id: &str) -> AccountId {
        AccountId::new(id)
    }

    fn triangle(closing_weight: f64) -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        graph.add_edge(acc("A"), acc("B"), 1.0);
        graph.add_edge(acc("B"), acc("C"), 1.0);
        graph.add_edge(acc("C"), acc("A"), closing_weight);
        graph
    }

    #[test]
    fn test_floyd_warshall_negative_cycle() {
        let fw = FloydWarshall::compute(&triangle(-3.0), &ComputeBudget::default()).unwrap();
        assert!(fw.has_negative_cycle());
        assert_eq!(fw.negative_cycle_nodes(), vec![acc("A"), acc("B"), acc("C")]);
    }

    #[test]
    fn test_floyd_warshall_positive_weights() {
        let fw = FloydWarshall::compute(&triangle(3.0), &ComputeBudget::default()).unwrap();
        assert!(!fw.has_negative_cycle());
        assert_relative_eq!(fw.distance(&acc("A"), &acc("C")).unwrap(), 2.0);
        assert_eq!(
            fw.path(&acc("A"), &acc("C")).unwrap(),
            vec![acc("A"), acc("B"), acc("C")]
        );
    }

    #[test]
    fn test_floyd_warshall_unreachable() {
        let mut graph = TransactionGraph::new();
        graph.add_edge(acc("A"), acc("B"), 1.0);
        let fw = FloydWarshall::compute(&graph, &ComputeBudget::default()).unwrap();
        assert!(fw.distance(&acc("B"), &acc("A")).is_none());
        assert!(fw.path(&acc("B"), &acc("A")).is_none());
    }

    #[test]
    fn test_floyd_warshall_rejects_unknown_account() {
        let edge = TransactionEdge::new(acc("A"), acc("Z"), 1.0);
        let err = FloydWarshall::from_parts(&[acc("A")], [&edge], &ComputeBudget::default())
            .unwrap_err();
        assert!(matches!(err, DetectionError::InvalidInput(_)));
    }

    #[test]
    fn test_floyd_warshall_dense_limit() {
        let budget = ComputeBudget {
            dense_max_nodes: 2,
            ..ComputeBudget::default()
        };
        let err = FloydWarshall::compute(&triangle(1.0), &budget).unwrap_err();
        assert!(matches!(err, DetectionError::ComputationOverrun { .. }));
    }

    #[test]
    fn test_bellman_ford_negative_cycle() {
        let report =
            BellmanFord::run(&triangle(-3.0), &acc("A"), &ComputeBudget::default()).unwrap();
        assert!(report.has_negative_cycle);
        assert!(!report.affected_nodes.is_empty());
    }

    #[test]
    fn test_bellman_ford_positive_weights() {
        let report =
            BellmanFord::run(&triangle(3.0), &acc("A"), &ComputeBudget::default()).unwrap();
        assert!(!report.has_negative_cycle);
        assert!(report.affected_nodes.is_empty());
    }

    #[test]
    fn test_bellman_ford_unreachable_cycle_is_invisible() {
        let mut graph = triangle(-3.0);
        graph.add_node(acc("Z"));
        let report = BellmanFord::run(&graph, &acc("Z"), &ComputeBudget::default()).unwrap();
        assert!(!report.has_negative_cycle);
    }

    #[test]
    fn test_bellman_ford_unknown_source() {
        let err = BellmanFord::run(&triangle(1.0), &acc("nobody"), &ComputeBudget::default())
            .unwrap_err();
        assert!(matches!(err, DetectionError::InvalidInput(_)));
    }
}
