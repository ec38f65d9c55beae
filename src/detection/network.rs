//! In-memory transaction network answering the detection queries.

use crate::core::account::AccountId;
use crate::core::error::{DetectionError, Result};
use crate::core::transaction::{TransactionEdge, DEFAULT_LABEL};
use crate::detection::query::{
    CardLocationOverlap, ClosedPath, GraphQuery, ReturningPath, SharedIdentityLoop,
};
use crate::graph::budget::Deadline;
use crate::graph::path_search::{enumerate_closed_paths, validate_hop_range};
use crate::graph::transaction_graph::TransactionGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::Path;

/// Relation labels that carry money by default.
pub const MONEY_FLOW_LABELS: [&str; 2] = ["TRANSFER", "TRANSACTION"];
/// Relation label linking related accounts by default.
pub const RELATIONSHIP_LABEL: &str = "HAS_RELATIONSHIP";

const COLLABORATOR: &str = "transaction network";

/// One use of a card at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardUsage {
    pub card_id: String,
    pub location: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Identity information used by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub identity_id: String,
    pub account: AccountId,
}

/// A transaction or relation as it appears in network files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub from: String,
    pub to: String,
    pub amount: f64,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

/// On-disk JSON layout of a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkFile {
    pub transactions: Vec<TransactionRecord>,
    #[serde(default)]
    pub card_usages: Vec<CardUsage>,
    #[serde(default)]
    pub identity_links: Vec<IdentityLink>,
}

/// A labelled transaction graph plus the card and identity data the pattern
/// queries need.
#[derive(Debug, Clone)]
pub struct TransactionNetwork {
    graph: TransactionGraph,
    card_usages: Vec<CardUsage>,
    identity_links: Vec<IdentityLink>,
    money_flow_labels: Vec<String>,
    relationship_label: String,
}

impl Default for TransactionNetwork {
    fn default() -> Self {
        Self::new(TransactionGraph::new())
    }
}

impl TransactionNetwork {
    pub fn new(graph: TransactionGraph) -> Self {
        Self {
            graph,
            card_usages: Vec::new(),
            identity_links: Vec::new(),
            money_flow_labels: MONEY_FLOW_LABELS.iter().map(|s| s.to_string()).collect(),
            relationship_label: RELATIONSHIP_LABEL.to_string(),
        }
    }

    pub fn from_file_data(data: NetworkFile) -> Self {
        let mut network = Self::default();
        for tx in data.transactions {
            network.graph.add_labeled_edge(
                AccountId::new(tx.from),
                AccountId::new(tx.to),
                tx.amount,
                &tx.label,
                tx.timestamp,
            );
        }
        network.card_usages = data.card_usages;
        network.identity_links = data.identity_links;
        network
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let data: NetworkFile = serde_json::from_str(json)
            .map_err(|e| DetectionError::invalid_input(format!("malformed network JSON: {}", e)))?;
        Ok(Self::from_file_data(data))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DetectionError::unavailable(COLLABORATOR, format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn to_file_data(&self) -> NetworkFile {
        NetworkFile {
            transactions: self
                .graph
                .edges()
                .map(|e| TransactionRecord {
                    from: e.from().to_string(),
                    to: e.to().to_string(),
                    amount: e.weight(),
                    label: e.label().to_string(),
                    timestamp: e.timestamp(),
                })
                .collect(),
            card_usages: self.card_usages.clone(),
            identity_links: self.identity_links.clone(),
        }
    }

    pub fn with_money_flow_labels(mut self, labels: Vec<String>) -> Self {
        self.money_flow_labels = labels;
        self
    }

    pub fn with_relationship_label(mut self, label: impl Into<String>) -> Self {
        self.relationship_label = label.into();
        self
    }

    pub fn add_transaction(&mut self, edge: TransactionEdge) {
        self.graph.insert_edge(edge);
    }

    pub fn add_card_usage(&mut self, usage: CardUsage) {
        self.card_usages.push(usage);
    }

    pub fn add_identity_link(&mut self, identity_id: impl Into<String>, account: AccountId) {
        self.identity_links.push(IdentityLink {
            identity_id: identity_id.into(),
            account,
        });
    }

    pub fn graph(&self) -> &TransactionGraph {
        &self.graph
    }

    /// The graph restricted to money-flow edges.
    pub fn money_flow_graph(&self) -> TransactionGraph {
        self.graph.filtered(&self.money_flow_labels)
    }

    pub fn card_usages(&self) -> &[CardUsage] {
        &self.card_usages
    }

    pub fn identity_links(&self) -> &[IdentityLink] {
        &self.identity_links
    }
}

/// Accounts reachable from `start` in `1..=max_hops` edges.
fn reachable_within(
    graph: &TransactionGraph,
    start: &AccountId,
    max_hops: usize,
    deadline: &Deadline,
) -> Result<HashSet<AccountId>> {
    let mut reached = HashSet::new();
    let mut seen = HashSet::from([start.clone()]);
    let mut frontier = VecDeque::from([(start.clone(), 0usize)]);

    while let Some((node, depth)) = frontier.pop_front() {
        deadline.check()?;
        if depth == max_hops {
            continue;
        }
        for edge in graph.neighbors(&node) {
            let next = edge.to();
            reached.insert(next.clone());
            if seen.insert(next.clone()) {
                frontier.push_back((next.clone(), depth + 1));
            }
        }
    }
    Ok(reached)
}

impl GraphQuery for TransactionNetwork {
    fn find_returning_paths(
        &self,
        min_hops: usize,
        max_hops: usize,
        deadline: &Deadline,
    ) -> Result<Vec<ReturningPath>> {
        validate_hop_range(min_hops, max_hops)?;
        let flows = self.money_flow_graph();
        let walks = enumerate_closed_paths(&flows, min_hops, max_hops, deadline)?;
        Ok(walks
            .into_iter()
            .map(|walk| ReturningPath {
                origin_id: walk.origin().clone(),
                hop_count: walk.hop_count(),
                total_weight: walk.total_weight(),
            })
            .collect())
    }

    /// Pairs are taken in timestamp order per card; both locations of every
    /// pair feed `distinct_location_count`.
    fn find_card_location_overlaps(
        &self,
        window: chrono::Duration,
        deadline: &Deadline,
    ) -> Result<Vec<CardLocationOverlap>> {
        if window <= chrono::Duration::zero() {
            return Err(DetectionError::invalid_input("card window must be positive"));
        }

        let mut by_card: BTreeMap<&str, Vec<&CardUsage>> = BTreeMap::new();
        for usage in &self.card_usages {
            by_card.entry(usage.card_id.as_str()).or_default().push(usage);
        }

        let mut overlaps = Vec::new();
        for (card_id, mut usages) in by_card {
            deadline.check()?;
            usages.sort_by_key(|u| u.timestamp);

            let mut locations = BTreeSet::new();
            let mut total_amount = 0.0;
            for (i, first) in usages.iter().enumerate() {
                for second in &usages[i + 1..] {
                    if second.timestamp - first.timestamp >= window {
                        break;
                    }
                    if second.timestamp > first.timestamp && first.location != second.location {
                        locations.insert(first.location.as_str());
                        locations.insert(second.location.as_str());
                        total_amount += first.amount + second.amount;
                    }
                }
            }

            if !locations.is_empty() {
                overlaps.push(CardLocationOverlap {
                    card_id: card_id.to_string(),
                    distinct_location_count: locations.len(),
                    total_amount,
                });
            }
        }
        Ok(overlaps)
    }

    fn find_shared_identity_loops(
        &self,
        max_hops: usize,
        deadline: &Deadline,
    ) -> Result<Vec<SharedIdentityLoop>> {
        validate_hop_range(1, max_hops)?;
        let relations = self.graph.filtered(&[self.relationship_label.as_str()]);

        let mut by_identity: BTreeMap<&str, BTreeSet<&AccountId>> = BTreeMap::new();
        for link in &self.identity_links {
            by_identity
                .entry(link.identity_id.as_str())
                .or_default()
                .insert(&link.account);
        }

        let mut loops = Vec::new();
        for (identity_id, accounts) in by_identity {
            if accounts.len() < 2 {
                continue;
            }
            let mut linked = Vec::new();
            for &a1 in &accounts {
                let reached = reachable_within(&relations, a1, max_hops, deadline)?;
                if accounts.iter().any(|&a2| a2 != a1 && reached.contains(a2)) {
                    linked.push(a1.clone());
                }
            }
            if !linked.is_empty() {
                loops.push(SharedIdentityLoop {
                    identity_id: identity_id.to_string(),
                    account_count: linked.len(),
                    account_ids: linked,
                });
            }
        }
        Ok(loops)
    }

    fn find_closed_paths(
        &self,
        relation_label: &str,
        min_hops: usize,
        max_hops: usize,
        deadline: &Deadline,
    ) -> Result<Vec<ClosedPath>> {
        if relation_label.trim().is_empty() {
            return Err(DetectionError::invalid_input("relation label must not be empty"));
        }
        validate_hop_range(min_hops, max_hops)?;

        let sub = self.graph.filtered(&[relation_label]);
        let walks = enumerate_closed_paths(&sub, min_hops, max_hops, deadline)?;
        Ok(walks
            .into_iter()
            .map(|walk| ClosedPath {
                hop_count: walk.hop_count(),
                node_sequence: walk.nodes,
                edge_sequence: walk.edges,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn acc(id: &str) -> AccountId {
        AccountId::new(id)
    }

    fn deadline() -> Deadline {
        Deadline::none("test")
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn usage(card: &str, location: &str, amount: f64, minute: i64) -> CardUsage {
        CardUsage {
            card_id: card.to_string(),
            location: location.to_string(),
            amount,
            timestamp: at(minute),
        }
    }

    #[test]
    fn test_returning_paths_use_money_flow_labels() {
        let mut graph = TransactionGraph::new();
        graph.add_labeled_edge(acc("A"), acc("B"), 10.0, "TRANSFER", None);
        graph.add_labeled_edge(acc("B"), acc("A"), 20.0, "TRANSACTION", None);
        graph.add_labeled_edge(acc("B"), acc("C"), 5.0, "TRANSFER", None);
        graph.add_labeled_edge(acc("C"), acc("B"), 5.0, "HAS_RELATIONSHIP", None);
        let network = TransactionNetwork::new(graph);

        let paths = network.find_returning_paths(2, 10, &deadline()).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].origin_id, acc("A"));
        assert_eq!(paths[0].hop_count, 2);
        assert_eq!(paths[0].total_weight, 30.0);
    }

    #[test]
    fn test_card_overlap_inside_window() {
        let mut network = TransactionNetwork::default();
        network.add_card_usage(usage("CARD-1", "Paris", 100.0, 0));
        network.add_card_usage(usage("CARD-1", "Tokyo", 200.0, 30));
        network.add_card_usage(usage("CARD-2", "Berlin", 50.0, 0));
        network.add_card_usage(usage("CARD-2", "Rome", 50.0, 90));

        let overlaps = network
            .find_card_location_overlaps(Duration::minutes(60), &deadline())
            .unwrap();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].card_id, "CARD-1");
        assert_eq!(overlaps[0].distinct_location_count, 2);
        assert_eq!(overlaps[0].total_amount, 300.0);
    }

    #[test]
    fn test_card_overlap_counts_both_locations_of_each_pair() {
        let mut network = TransactionNetwork::default();
        network.add_card_usage(usage("CARD-1", "Paris", 100.0, 0));
        network.add_card_usage(usage("CARD-1", "Paris", 100.0, 10));
        network.add_card_usage(usage("CARD-1", "Tokyo", 50.0, 20));

        let overlaps = network
            .find_card_location_overlaps(Duration::minutes(60), &deadline())
            .unwrap();
        assert_eq!(overlaps.len(), 1);
        // Tokyo only ever appears as the later use but is still counted
        assert_eq!(overlaps[0].distinct_location_count, 2);
        assert_eq!(overlaps[0].total_amount, 300.0);

        network.add_card_usage(usage("CARD-1", "Rome", 10.0, 30));
        let overlaps = network
            .find_card_location_overlaps(Duration::minutes(60), &deadline())
            .unwrap();
        assert_eq!(overlaps[0].distinct_location_count, 3);
    }

    #[test]
    fn test_card_same_location_is_not_overlap() {
        let mut network = TransactionNetwork::default();
        network.add_card_usage(usage("CARD-1", "Paris", 100.0, 0));
        network.add_card_usage(usage("CARD-1", "Paris", 100.0, 10));
        let overlaps = network
            .find_card_location_overlaps(Duration::minutes(60), &deadline())
            .unwrap();
        assert!(overlaps.is_empty());
        assert!(network
            .find_card_location_overlaps(Duration::zero(), &deadline())
            .is_err());
    }

    #[test]
    fn test_shared_identity_loop() {
        let mut graph = TransactionGraph::new();
        graph.add_labeled_edge(acc("A1"), acc("A2"), 0.0, RELATIONSHIP_LABEL, None);
        graph.add_labeled_edge(acc("A2"), acc("A3"), 0.0, RELATIONSHIP_LABEL, None);
        let mut network = TransactionNetwork::new(graph);
        network.add_identity_link("SSN-1", acc("A1"));
        network.add_identity_link("SSN-1", acc("A3"));
        network.add_identity_link("SSN-2", acc("A2"));

        let loops = network.find_shared_identity_loops(5, &deadline()).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].identity_id, "SSN-1");
        assert_eq!(loops[0].account_count, 1);
        assert_eq!(loops[0].account_ids, vec![acc("A1")]);

        assert!(network.find_shared_identity_loops(1, &deadline()).unwrap().is_empty());
        assert!(network.find_shared_identity_loops(0, &deadline()).is_err());
    }

    #[test]
    fn test_closed_paths_by_label() {
        let mut graph = TransactionGraph::new();
        for (from, to) in [("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")] {
            graph.add_labeled_edge(acc(from), acc(to), 30_000.0, "TRANSFER", None);
        }
        let network = TransactionNetwork::new(graph);

        let paths = network.find_closed_paths("TRANSFER", 2, 10, &deadline()).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].hop_count, 4);
        assert_eq!(paths[0].node_sequence.first(), paths[0].node_sequence.last());
        assert!(network.find_closed_paths("WIRE", 2, 10, &deadline()).unwrap().is_empty());
        assert!(network.find_closed_paths("", 2, 10, &deadline()).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "transactions": [
                { "from": "A", "to": "B", "amount": 10.0 },
                { "from": "B", "to": "A", "amount": 5.0, "label": "TRANSACTION" }
            ],
            "identity_links": [ { "identity_id": "SSN-1", "account": "A" } ]
        }"#;
        let network = TransactionNetwork::from_json(json).unwrap();
        assert_eq!(network.graph().edge_count(), 2);
        assert_eq!(network.identity_links().len(), 1);

        let data = network.to_file_data();
        assert_eq!(data.transactions[0].label, "TRANSFER");
        assert!(TransactionNetwork::from_json("{").is_err());
    }
}
