use crate::core::account::AccountId;
use crate::core::transaction::TransactionEdge;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// A directed, weighted multigraph of transactions between accounts.
///
/// Stored as an adjacency list keyed by source account. Outgoing edges keep
/// their insertion order and are never deduplicated, so repeated transactions
/// between the same pair remain visible to the engines. A node without
/// outgoing edges is equivalent to a node with an empty entry.
///
/// This is the input to every cycle engine in [`crate::graph`].
///
/// # Examples
///
/// ```
/// use cycle_sentinel::prelude::*;
///
/// let mut graph = TransactionGraph::new();
/// graph.add_edge(AccountId::new("A"), AccountId::new("B"), 100.0);
/// graph.add_edge(AccountId::new("B"), AccountId::new("A"), 60.0);
///
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 2);
/// assert!(graph.neighbors(&AccountId::new("Z")).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    /// source -> outgoing edges, in insertion order
    adjacency: BTreeMap<AccountId, Vec<TransactionEdge>>,
    /// All known accounts, including pure sinks
    nodes: BTreeSet<AccountId>,
    edge_count: usize,
}

impl TransactionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a list of edges.
    pub fn from_edges(edges: impl IntoIterator<Item = TransactionEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.insert_edge(edge);
        }
        graph
    }

    /// Register an account with no edges.
    pub fn add_node(&mut self, account: AccountId) {
        self.nodes.insert(account);
    }

    /// Add an edge with the default relation label.
    pub fn add_edge(&mut self, from: AccountId, to: AccountId, weight: f64) {
        self.insert_edge(TransactionEdge::new(from, to, weight));
    }

    /// Add an edge under a named relation, optionally timestamped.
    pub fn add_labeled_edge(
        &mut self,
        from: AccountId,
        to: AccountId,
        weight: f64,
        label: &str,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let mut edge = TransactionEdge::new(from, to, weight).with_label(label);
        if let Some(ts) = timestamp {
            edge = edge.with_timestamp(ts);
        }
        self.insert_edge(edge);
    }

    /// Add a fully built edge.
    pub fn insert_edge(&mut self, edge: TransactionEdge) {
        self.nodes.insert(edge.from().clone());
        self.nodes.insert(edge.to().clone());
        self.adjacency
            .entry(edge.from().clone())
            .or_default()
            .push(edge);
        self.edge_count += 1;
    }

    /// Outgoing edges of `account`. Unknown accounts have none.
    pub fn neighbors(&self, account: &AccountId) -> &[TransactionEdge] {
        self.adjacency
            .get(account)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All accounts, sorted.
    pub fn nodes(&self) -> Vec<AccountId> {
        self.nodes.iter().cloned().collect()
    }

    pub fn contains_node(&self, account: &AccountId) -> bool {
        self.nodes.contains(account)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All edges, grouped by source account in sorted order.
    pub fn edges(&self) -> impl Iterator<Item = &TransactionEdge> {
        self.adjacency.values().flatten()
    }

    /// Sum of all edge weights from `from` to `to` (repeated transactions add up).
    pub fn edge_weight(&self, from: &AccountId, to: &AccountId) -> f64 {
        self.neighbors(from)
            .iter()
            .filter(|e| e.to() == to)
            .map(TransactionEdge::weight)
            .sum()
    }

    pub fn has_edge(&self, from: &AccountId, to: &AccountId) -> bool {
        self.neighbors(from).iter().any(|e| e.to() == to)
    }

    /// Subgraph containing only edges whose label is in `labels`.
    ///
    /// Every account is kept, so node counts stay comparable with the full graph.
    pub fn filtered<S: AsRef<str>>(&self, labels: &[S]) -> TransactionGraph {
        let mut sub = TransactionGraph {
            nodes: self.nodes.clone(),
            ..Default::default()
        };
        for edge in self.edges() {
            if labels.iter().any(|l| l.as_ref() == edge.label()) {
                sub.insert_edge(edge.clone());
            }
        }
        sub
    }

}

impl FromIterator<TransactionEdge> for TransactionGraph {
    fn from_iter<T: IntoIterator<Item = TransactionEdge>>(iter: T) -> Self {
        Self::from_edges(iter)
    }
}
