use crate::core::account::AccountId;
use crate::core::error::Result;
use crate::graph::budget::{ComputeBudget, Deadline};
use crate::graph::transaction_graph::TransactionGraph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const ENGINE: &str = "tarjan-scc";

/// A strongly connected component of the transaction graph.
///
/// Every account in the component can reach every other one, so any
/// component with more than one account contains at least one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StronglyConnectedComponent {
    /// Member accounts, sorted.
    pub accounts: Vec<AccountId>,
}

impl StronglyConnectedComponent {
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Returns true if this component groups more than one account
    /// (meaning money can circulate within it).
    pub fn is_cyclic(&self) -> bool {
        self.accounts.len() > 1
    }

    pub fn contains(&self, account: &AccountId) -> bool {
        self.accounts.binary_search(account).is_ok()
    }
}

/// Find all strongly connected components using Tarjan's algorithm.
///
/// Components are emitted in reverse topological order; each one is sorted.
/// Singletons are included, see [`cyclic_components`] for the cycle view.
pub fn find_sccs(
    graph: &TransactionGraph,
    budget: &ComputeBudget,
) -> Result<Vec<StronglyConnectedComponent>> {
    let deadline = budget.admit(graph, ENGINE)?;

    let mut state = TarjanState::default();
    for account in graph.nodes() {
        if !state.indices.contains_key(&account) {
            state.strongconnect(account, graph, &deadline)?;
        }
    }

    Ok(state
        .result
        .into_iter()
        .map(|accounts| StronglyConnectedComponent { accounts })
        .collect())
}

/// Maximal cyclic groups: components with more than one account.
pub fn cyclic_components(
    graph: &TransactionGraph,
    budget: &ComputeBudget,
) -> Result<Vec<StronglyConnectedComponent>> {
    let mut components = find_sccs(graph, budget)?;
    components.retain(StronglyConnectedComponent::is_cyclic);
    Ok(components)
}

#[derive(Default)]
struct TarjanState {
    index_counter: usize,
    stack: Vec<AccountId>,
    on_stack: HashSet<AccountId>,
    indices: HashMap<AccountId, usize>,
    lowlinks: HashMap<AccountId, usize>,
    result: Vec<Vec<AccountId>>,
}

impl TarjanState {
    fn visit(&mut self, v: AccountId, deadline: &Deadline) -> Result<()> {
        deadline.check()?;
        self.indices.insert(v.clone(), self.index_counter);
        self.lowlinks.insert(v.clone(), self.index_counter);
        self.index_counter += 1;
        self.stack.push(v.clone());
        self.on_stack.insert(v);
        Ok(())
    }

    fn lower(&mut self, v: &AccountId, candidate: usize) {
        if let Some(low) = self.lowlinks.get_mut(v) {
            *low = (*low).min(candidate);
        }
    }

    /// Tarjan from `root`, driven by an explicit stack of
    /// `(account, next edge index)` frames in place of recursion.
    fn strongconnect(
        &mut self,
        root: AccountId,
        graph: &TransactionGraph,
        deadline: &Deadline,
    ) -> Result<()> {
        self.visit(root.clone(), deadline)?;
        let mut frames: Vec<(AccountId, usize)> = vec![(root, 0)];

        while let Some((v, next_edge)) = frames.last_mut() {
            if let Some(edge) = graph.neighbors(v).get(*next_edge) {
                *next_edge += 1;
                let v = v.clone();
                let w = edge.to();
                if !self.indices.contains_key(w) {
                    self.visit(w.clone(), deadline)?;
                    frames.push((w.clone(), 0));
                } else if self.on_stack.contains(w) {
                    let index = self.indices[w];
                    self.lower(&v, index);
                }
                continue;
            }

            let v = v.clone();
            frames.pop();

            // v is a root: everything above it on the stack forms one component
            let low = self.lowlinks[&v];
            if low == self.indices[&v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(&w);
                    let is_root = w == v;
                    component.push(w);
                    if is_root {
                        break;
                    }
                }
                component.sort();
                self.result.push(component);
            }

            if let Some((parent, _)) = frames.last() {
                let parent = parent.clone();
                self.lower(&parent, low);
            }
        }
        Ok(())
    }
}
