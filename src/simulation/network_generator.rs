//! Random transaction networks for benchmarks, property tests and the CLI.

use crate::core::account::AccountId;
use crate::core::transaction::TransactionEdge;
use crate::detection::network::{CardUsage, TransactionNetwork, MONEY_FLOW_LABELS, RELATIONSHIP_LABEL};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for generating a random transaction network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub account_count: usize,
    /// Average number of outgoing money-flow edges per account.
    pub avg_transfers_per_account: usize,
    pub min_amount: f64,
    pub max_amount: f64,
    /// Relationship edges between random account pairs.
    pub relationship_count: usize,
    pub card_count: usize,
    pub uses_per_card: usize,
    pub locations: Vec<String>,
    /// Card uses are spread over this many minutes.
    pub card_span_minutes: i64,
    pub identity_count: usize,
    pub accounts_per_identity: usize,
    /// Fixed seed for reproducible networks.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            account_count: 10,
            avg_transfers_per_account: 3,
            min_amount: 100.0,
            max_amount: 100_000.0,
            relationship_count: 5,
            card_count: 3,
            uses_per_card: 4,
            locations: ["London", "New York", "Singapore", "Sao Paulo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            card_span_minutes: 240,
            identity_count: 2,
            accounts_per_identity: 2,
            seed: None,
        }
    }
}

fn account(i: usize) -> AccountId {
    AccountId::new(format!("ACC-{:04}", i))
}

/// Generate a random network. Self-transfers are never produced.
pub fn generate_random_network(config: &NetworkConfig) -> TransactionNetwork {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut network = TransactionNetwork::default();
    let n = config.account_count;
    if n < 2 {
        return network;
    }

    let (lo, hi) = if config.min_amount < config.max_amount {
        (config.min_amount, config.max_amount)
    } else {
        (config.min_amount, config.min_amount + 1.0)
    };

    let start = Utc::now() - Duration::days(1);
    for _ in 0..n * config.avg_transfers_per_account {
        let (from, to) = distinct_pair(&mut rng, n);
        let label = MONEY_FLOW_LABELS[rng.gen_range(0..MONEY_FLOW_LABELS.len())];
        let amount = (rng.gen_range(lo..hi) * 100.0).round() / 100.0;
        let at = start + Duration::minutes(rng.gen_range(0..24 * 60));
        network.add_transaction(
            TransactionEdge::new(account(from), account(to), amount)
                .with_label(label)
                .with_timestamp(at),
        );
    }

    for _ in 0..config.relationship_count {
        let (from, to) = distinct_pair(&mut rng, n);
        network.add_transaction(
            TransactionEdge::new(account(from), account(to), 0.0).with_label(RELATIONSHIP_LABEL),
        );
    }

    if !config.locations.is_empty() {
        let span = config.card_span_minutes.max(1);
        for card in 0..config.card_count {
            for _ in 0..config.uses_per_card {
                network.add_card_usage(CardUsage {
                    card_id: format!("CARD-{:04}", card),
                    location: config.locations[rng.gen_range(0..config.locations.len())].clone(),
                    amount: (rng.gen_range(lo..hi) * 100.0).round() / 100.0,
                    timestamp: start + Duration::minutes(rng.gen_range(0..span)),
                });
            }
        }
    }

    for identity in 0..config.identity_count {
        for _ in 0..config.accounts_per_identity {
            network.add_identity_link(format!("ID-{:04}", identity), account(rng.gen_range(0..n)));
        }
    }

    network
}

fn distinct_pair(rng: &mut StdRng, n: usize) -> (usize, usize) {
    let from = rng.gen_range(0..n);
    let mut to = rng.gen_range(0..n);
    while to == from {
        to = rng.gen_range(0..n);
    }
    (from, to)
}

/// A single ring `ACC-0000 → ACC-0001 → … → ACC-0000` with equal weights.
pub fn generate_ring(len: usize, weight: f64) -> TransactionNetwork {
    let mut network = TransactionNetwork::default();
    for i in 0..len {
        network.add_transaction(TransactionEdge::new(account(i), account((i + 1) % len), weight));
    }
    network
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_network_generation() {
        let config = NetworkConfig {
            account_count: 8,
            avg_transfers_per_account: 3,
            seed: Some(7),
            ..Default::default()
        };

        let network = generate_random_network(&config);
        let flows = network.money_flow_graph();
        assert_eq!(flows.edge_count(), 24);
        assert!(flows.edges().all(|e| !e.is_self_loop()));
        assert!(flows
            .edges()
            .all(|e| e.weight() >= config.min_amount && e.weight() <= config.max_amount));
        assert_eq!(network.card_usages().len(), 12);
        assert_eq!(network.identity_links().len(), 4);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = NetworkConfig {
            seed: Some(42),
            ..Default::default()
        };
        let a = generate_random_network(&config).to_file_data();
        let b = generate_random_network(&config).to_file_data();
        assert_eq!(a.transactions.len(), b.transactions.len());
        for (x, y) in a.transactions.iter().zip(&b.transactions) {
            assert_eq!((&x.from, &x.to, x.amount), (&y.from, &y.to, y.amount));
        }
    }

    #[test]
    fn test_ring() {
        let network = generate_ring(5, 10.0);
        assert_eq!(network.graph().node_count(), 5);
        assert_eq!(network.graph().edge_count(), 5);
    }

    #[test]
    fn test_tiny_network_is_empty() {
        let config = NetworkConfig {
            account_count: 1,
            ..Default::default()
        };
        assert!(generate_random_network(&config).graph().is_empty());
    }
}
