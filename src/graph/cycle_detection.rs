use crate::core::account::AccountId;
use crate::core::error::Result;
use crate::graph::budget::{ComputeBudget, Deadline};
use crate::graph::transaction_graph::TransactionGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const ENGINE: &str = "dfs-cycles";

/// A closed walk through the transaction graph.
///
/// Stored with the starting account repeated at the end, so `A → B → C → A`
/// is `[A, B, C, A]`. Its length counts distinct accounts, so that example
/// has length 3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    nodes: Vec<AccountId>,
}

impl Cycle {
    /// Close an open path by repeating its first account at the end.
    pub fn from_path(mut path: Vec<AccountId>) -> Self {
        if let Some(first) = path.first().cloned() {
            if path.len() == 1 || path.last() != Some(&first) {
                path.push(first);
            }
        }
        Self { nodes: path }
    }

    /// The closed node sequence (first == last).
    pub fn nodes(&self) -> &[AccountId] {
        &self.nodes
    }

    /// The accounts on the cycle without the closing repeat.
    pub fn accounts(&self) -> &[AccountId] {
        &self.nodes[..self.len()]
    }

    /// Number of accounts (and edges) in this cycle.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts().contains(account)
    }

    /// Sum of the aggregated edge weights along the cycle.
    pub fn total_weight(&self, graph: &TransactionGraph) -> f64 {
        self.nodes
            .windows(2)
            .map(|pair| graph.edge_weight(&pair[0], &pair[1]))
            .sum()
    }

    /// Normalize to the smallest rotation so rotated copies compare equal.
    pub fn canonical_form(&self) -> Vec<AccountId> {
        let accounts = self.accounts();
        if accounts.is_empty() {
            return Vec::new();
        }
        let n = accounts.len();
        let mut best = accounts.to_vec();
        for i in 1..n {
            let rotated: Vec<AccountId> = accounts[i..]
                .iter()
                .chain(accounts[..i].iter())
                .cloned()
                .collect();
            if rotated < best {
                best = rotated;
            }
        }
        best
    }
}

/// Detect cycles with a single-pass depth-first search.
///
/// Every account not yet visited starts a fresh walk, in sorted order. A back
/// edge to an account on the current path emits the path suffix from that
/// account, closed by the account itself.
///
/// The global visited set means this is a reachability check rather than an
/// exhaustive enumeration: two cycles sharing a region may yield only one of
/// them. Use [`crate::graph::scc::cyclic_components`] when every cyclic group
/// must be found.
pub fn find_cycles(graph: &TransactionGraph, budget: &ComputeBudget) -> Result<Vec<Cycle>> {
    let deadline = budget.admit(graph, ENGINE)?;
    let mut state = DfsState::default();

    for start in graph.nodes() {
        if !state.visited.contains(&start) {
            state.walk(start, graph, &deadline)?;
        }
    }

    log::debug!(
        "dfs found {} cycle(s) over {} accounts",
        state.cycles.len(),
        graph.node_count()
    );
    Ok(state.cycles)
}

/// True iff [`find_cycles`] yields at least one cycle.
pub fn has_cycle(graph: &TransactionGraph, budget: &ComputeBudget) -> Result<bool> {
    Ok(!find_cycles(graph, budget)?.is_empty())
}

#[derive(Default)]
struct DfsState {
    visited: HashSet<AccountId>,
    on_path: HashSet<AccountId>,
    path: Vec<AccountId>,
    cycles: Vec<Cycle>,
}

impl DfsState {
    fn enter(&mut self, account: AccountId, deadline: &Deadline) -> Result<()> {
        deadline.check()?;
        self.visited.insert(account.clone());
        self.on_path.insert(account.clone());
        self.path.push(account);
        Ok(())
    }

    /// Depth-first walk from `start` on an explicit stack of
    /// `(account, next edge index)` frames.
    fn walk(&mut self, start: AccountId, graph: &TransactionGraph, deadline: &Deadline) -> Result<()> {
        self.enter(start.clone(), deadline)?;
        let mut frames: Vec<(AccountId, usize)> = vec![(start, 0)];

        while let Some((current, next_edge)) = frames.last_mut() {
            let edges = graph.neighbors(current);
            let Some(edge) = edges.get(*next_edge) else {
                self.path.pop();
                self.on_path.remove(&*current);
                frames.pop();
                continue;
            };
            *next_edge += 1;

            let next = edge.to();
            if !self.visited.contains(next) {
                let next = next.clone();
                self.enter(next.clone(), deadline)?;
                frames.push((next, 0));
            } else if self.on_path.contains(next) {
                // Back edge: the path suffix from `next` closes a cycle
                if let Some(idx) = self.path.iter().position(|n| n == next) {
                    let mut nodes = self.path[idx..].to_vec();
                    nodes.push(next.clone());
                    self.cycles.push(Cycle { nodes });
                }
            }
        }
        Ok(())
    }
}
