use crate::core::error::{DetectionError, Result};
use crate::graph::transaction_graph::TransactionGraph;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Largest node count admitted by the O(V³) engines unless overridden.
pub const DEFAULT_DENSE_MAX_NODES: usize = 500;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Resource limits applied at every engine entry point and collaborator query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeBudget {
    /// Maximum accounts an engine will accept.
    pub max_nodes: Option<usize>,
    /// Maximum edges an engine will accept.
    pub max_edges: Option<usize>,
    /// Maximum accounts for all-pairs (Floyd–Warshall) analysis.
    pub dense_max_nodes: usize,
    /// Wall-clock limit per engine run or query, in milliseconds.
    pub time_limit_ms: Option<u64>,
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl Default for ComputeBudget {
    fn default() -> Self {
        Self {
            max_nodes: None,
            max_edges: None,
            dense_max_nodes: DEFAULT_DENSE_MAX_NODES,
            time_limit_ms: None,
            cancel: CancelToken::new(),
        }
    }
}

impl ComputeBudget {
    /// No size, time or density limits.
    pub fn unlimited() -> Self {
        Self {
            dense_max_nodes: usize::MAX,
            ..Self::default()
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit_ms = Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Start the clock for `engine` without any size checks.
    pub fn deadline(&self, engine: &'static str) -> Deadline {
        Deadline {
            engine,
            // A limit too far out to represent never fires
            expires_at: self
                .time_limit_ms
                .and_then(|ms| Instant::now().checked_add(Duration::from_millis(ms))),
            cancel: self.cancel.clone(),
        }
    }

    /// Check the graph against the size limits and start the clock.
    pub fn admit(&self, graph: &TransactionGraph, engine: &'static str) -> Result<Deadline> {
        self.admit_counts(graph.node_count(), graph.edge_count(), engine)
    }

    /// Like [`admit`](Self::admit) but also enforces the dense-engine node cap.
    pub fn admit_dense(&self, nodes: usize, edges: usize, engine: &'static str) -> Result<Deadline> {
        if nodes > self.dense_max_nodes {
            return Err(DetectionError::overrun(
                engine,
                format!(
                    "{} nodes exceeds the all-pairs limit of {}",
                    nodes, self.dense_max_nodes
                ),
            ));
        }
        self.admit_counts(nodes, edges, engine)
    }

    pub fn admit_counts(&self, nodes: usize, edges: usize, engine: &'static str) -> Result<Deadline> {
        if let Some(max) = self.max_nodes {
            if nodes > max {
                return Err(DetectionError::overrun(
                    engine,
                    format!("{} nodes exceeds limit of {}", nodes, max),
                ));
            }
        }
        if let Some(max) = self.max_edges {
            if edges > max {
                return Err(DetectionError::overrun(
                    engine,
                    format!("{} edges exceeds limit of {}", edges, max),
                ));
            }
        }
        let deadline = self.deadline(engine);
        deadline.check()?;
        Ok(deadline)
    }
}

/// A running clock for one engine invocation or collaborator query.
#[derive(Debug, Clone)]
pub struct Deadline {
    engine: &'static str,
    expires_at: Option<Instant>,
    cancel: CancelToken,
}

impl Deadline {
    /// A deadline that never fires.
    pub fn none(engine: &'static str) -> Self {
        Self {
            engine,
            expires_at: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Fail with `ComputationOverrun` once cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DetectionError::overrun(self.engine, "cancelled"));
        }
        if let Some(at) = self.expires_at {
            if Instant::now() >= at {
                return Err(DetectionError::overrun(self.engine, "deadline exceeded"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account::AccountId;

    fn triangle() -> TransactionGraph {
        let mut graph = TransactionGraph::new();
        graph.add_edge(AccountId::new("A"), AccountId::new("B"), 1.0);
        graph.add_edge(AccountId::new("B"), AccountId::new("C"), 1.0);
        graph.add_edge(AccountId::new("C"), AccountId::new("A"), 1.0);
        graph
    }

    #[test]
    fn test_unlimited_admits_everything() {
        let budget = ComputeBudget::unlimited();
        assert!(budget.admit(&triangle(), "test").is_ok());
        assert!(budget.admit_dense(10_000, 0, "test").is_ok());
    }

    #[test]
    fn test_node_limit() {
        let budget = ComputeBudget::default().with_max_nodes(2);
        let err = budget.admit(&triangle(), "dfs").unwrap_err();
        assert!(matches!(err, DetectionError::ComputationOverrun { engine: "dfs", .. }));
    }

    #[test]
    fn test_dense_limit() {
        let budget = ComputeBudget::default();
        assert!(budget.admit_dense(DEFAULT_DENSE_MAX_NODES, 0, "fw").is_ok());
        assert!(budget.admit_dense(DEFAULT_DENSE_MAX_NODES + 1, 0, "fw").is_err());
    }

    #[test]
    fn test_cancellation() {
        let token = CancelToken::new();
        let budget = ComputeBudget::unlimited().with_cancel(token.clone());
        let deadline = budget.deadline("scc");
        assert!(deadline.check().is_ok());
        token.cancel();
        assert!(deadline.check().is_err());
    }

    #[test]
    fn test_zero_time_limit_expires() {
        let budget = ComputeBudget::unlimited().with_time_limit(Duration::from_millis(0));
        assert!(budget.admit(&triangle(), "dfs").is_err());
    }

    #[test]
    fn test_huge_time_limit_saturates() {
        let budget = ComputeBudget::unlimited().with_time_limit(Duration::MAX);
        assert_eq!(budget.time_limit_ms, Some(u64::MAX));
        assert!(budget.admit(&triangle(), "dfs").is_ok());
        assert!(budget.deadline("dfs").check().is_ok());

        let budget = ComputeBudget::unlimited().with_time_limit(Duration::from_secs(90));
        assert_eq!(budget.time_limit_ms, Some(90_000));
    }
}
