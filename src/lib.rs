//! # cycle-sentinel
//!
//! Fraud cycle detection and risk scoring over transaction graphs.
//!
//! Money that leaves an account and returns to it through a chain of
//! intermediaries is a classic laundering signature. This crate finds such
//! loops, along with card-reuse and shared-identity patterns, classifies
//! them by severity and risk, and keeps a versioned record of each finding.
//!
//! ## Architecture
//!
//! - **core** — Account identifiers, transaction edges, the error type
//! - **graph** — Transaction graph, DFS cycles, SCCs, negative cycles, bounded path search
//! - **risk** — Severity and risk-score policies
//! - **detection** — Fraud patterns, detection records, store, service and reports
//! - **simulation** — Random network generation for benchmarks and testing
//!
//! ```
//! use cycle_sentinel::prelude::*;
//!
//! let mut graph = TransactionGraph::new();
//! graph.add_edge(AccountId::new("A"), AccountId::new("B"), 100.0);
//! graph.add_edge(AccountId::new("B"), AccountId::new("A"), 100.0);
//!
//! let cycles = find_cycles(&graph, &ComputeBudget::default()).unwrap();
//! assert_eq!(cycles.len(), 1);
//! ```

pub mod config;
pub mod core;
pub mod detection;
pub mod graph;
pub mod risk;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::core::account::AccountId;
    pub use crate::core::error::{DetectionError, Result};
    pub use crate::core::transaction::TransactionEdge;
    pub use crate::detection::network::TransactionNetwork;
    pub use crate::detection::record::{CycleDetection, CycleStatus, FraudPattern};
    pub use crate::detection::service::CycleDetectionService;
    pub use crate::detection::store::InMemoryDetectionStore;
    pub use crate::graph::budget::{CancelToken, ComputeBudget};
    pub use crate::graph::cycle_detection::{find_cycles, has_cycle, Cycle};
    pub use crate::graph::negative_cycle::{BellmanFord, FloydWarshall};
    pub use crate::graph::scc::cyclic_components;
    pub use crate::graph::transaction_graph::TransactionGraph;
    pub use crate::risk::classifier::{RiskPolicy, Severity};
}
