//! Transaction graph and the cycle engines that run over it.

pub mod analysis;
pub mod budget;
pub mod cycle_detection;
pub mod negative_cycle;
pub mod path_search;
pub mod scc;
pub mod transaction_graph;
