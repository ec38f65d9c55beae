//! Summary statistics over detected cycles, and a one-shot run of every
//! engine against a single graph.

use crate::core::account::AccountId;
use crate::core::error::Result;
use crate::graph::budget::ComputeBudget;
use crate::graph::cycle_detection::{find_cycles, Cycle};
use crate::graph::negative_cycle::{BellmanFord, FloydWarshall, NegativeCycleReport};
use crate::graph::scc::{cyclic_components, StronglyConnectedComponent};
use crate::graph::transaction_graph::TransactionGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean number of accounts per cycle, 0.0 for no cycles.
pub fn average_cycle_length(cycles: &[Cycle]) -> f64 {
    if cycles.is_empty() {
        return 0.0;
    }
    cycles.iter().map(Cycle::len).sum::<usize>() as f64 / cycles.len() as f64
}

/// The first longest cycle, if any.
pub fn longest_cycle(cycles: &[Cycle]) -> Option<&Cycle> {
    cycles
        .iter()
        .reduce(|best, c| if c.len() > best.len() { c } else { best })
}

/// The first shortest cycle, if any.
pub fn shortest_cycle(cycles: &[Cycle]) -> Option<&Cycle> {
    cycles
        .iter()
        .reduce(|best, c| if c.len() < best.len() { c } else { best })
}

/// How many cycles each account appears in.
pub fn node_frequency(cycles: &[Cycle]) -> BTreeMap<AccountId, usize> {
    let mut frequency = BTreeMap::new();
    for cycle in cycles {
        for account in cycle.accounts() {
            *frequency.entry(account.clone()).or_insert(0) += 1;
        }
    }
    frequency
}

/// Accounts ranked by cycle membership, most frequent first.
///
/// Equal counts are ordered by account id.
pub fn most_suspicious_nodes(cycles: &[Cycle], top_n: usize) -> Vec<AccountId> {
    rank_by_frequency(node_frequency(cycles), top_n)
}

pub(crate) fn rank_by_frequency(frequency: BTreeMap<AccountId, usize>, top_n: usize) -> Vec<AccountId> {
    let mut ranked: Vec<(AccountId, usize)> = frequency.into_iter().collect();
    // BTreeMap order is by id, so a stable sort keeps ties in id order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(top_n).map(|(id, _)| id).collect()
}

/// Result of running every engine over one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkAnalysis {
    pub node_count: usize,
    pub edge_count: usize,
    /// Cycles found by the single-pass DFS (not exhaustive).
    pub cycles: Vec<Cycle>,
    /// Maximal cyclic groups.
    pub cyclic_components: Vec<StronglyConnectedComponent>,
    pub average_cycle_length: f64,
    pub suspicious_accounts: Vec<AccountId>,
    /// Bellman–Ford from the requested source, when one was given.
    pub reachable_negative_cycle: Option<NegativeCycleReport>,
    /// Accounts on negative cycles per Floyd–Warshall. `None` when the graph
    /// was too large for the all-pairs engine.
    pub negative_cycle_accounts: Option<Vec<AccountId>>,
}

impl NetworkAnalysis {
    pub fn run(
        graph: &TransactionGraph,
        source: Option<&AccountId>,
        budget: &ComputeBudget,
        top_n: usize,
    ) -> Result<Self> {
        let cycles = find_cycles(graph, budget)?;
        let components = cyclic_components(graph, budget)?;

        let reachable_negative_cycle = match source {
            Some(src) => Some(BellmanFord::run(graph, src, budget)?),
            None => None,
        };

        let negative_cycle_accounts = if graph.node_count() <= budget.dense_max_nodes {
            Some(FloydWarshall::compute(graph, budget)?.negative_cycle_nodes())
        } else {
            log::warn!(
                "skipping floyd-warshall: {} accounts exceeds dense limit {}",
                graph.node_count(),
                budget.dense_max_nodes
            );
            None
        };

        log::info!(
            "network analysis: {} cycles, {} cyclic components over {} accounts",
            cycles.len(),
            components.len(),
            graph.node_count()
        );

        Ok(Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            average_cycle_length: average_cycle_length(&cycles),
            suspicious_accounts: most_suspicious_nodes(&cycles, top_n),
            cycles,
            cyclic_components: components,
            reachable_negative_cycle,
            negative_cycle_accounts,
        })
    }

    pub fn has_cycles(&self) -> bool {
        !self.cyclic_components.is_empty()
    }

    pub fn has_negative_cycle(&self) -> bool {
        self.reachable_negative_cycle
            .as_ref()
            .map_or(false, |r| r.has_negative_cycle)
            || self
                .negative_cycle_accounts
                .as_ref()
                .map_or(false, |nodes| !nodes.is_empty())
    }
}
