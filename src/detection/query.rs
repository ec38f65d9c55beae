//! The graph-store side of detection.
//!
//! [`GraphQuery`] is the only way the service reads the transaction network.
//! Implementations may sit on a database; [`TransactionNetwork`] is the
//! in-memory one.
//!
//! [`TransactionNetwork`]: crate::detection::network::TransactionNetwork

use crate::core::account::AccountId;
use crate::core::error::Result;
use crate::core::transaction::TransactionEdge;
use crate::graph::budget::Deadline;
use serde::{Deserialize, Serialize};

/// A directed path that leaves `origin_id` and returns to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturningPath {
    pub origin_id: AccountId,
    pub hop_count: usize,
    /// Sum of edge weights along the path.
    pub total_weight: f64,
}

/// A card used at different locations within the query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLocationOverlap {
    pub card_id: String,
    /// Locations seen on either side of any overlapping pair.
    pub distinct_location_count: usize,
    /// Sum of both amounts of every overlapping pair.
    pub total_amount: f64,
}

/// Accounts sharing one identity while linked by a relationship path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedIdentityLoop {
    pub identity_id: String,
    pub account_count: usize,
    pub account_ids: Vec<AccountId>,
}

/// A closed path over a single relation label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPath {
    /// Closed node sequence, first == last.
    pub node_sequence: Vec<AccountId>,
    pub edge_sequence: Vec<TransactionEdge>,
    pub hop_count: usize,
}

impl ClosedPath {
    /// Distinct accounts on the path, in first-visit order.
    pub fn distinct_accounts(&self) -> Vec<AccountId> {
        let mut seen = Vec::new();
        for account in &self.node_sequence {
            if !seen.contains(account) {
                seen.push(account.clone());
            }
        }
        seen
    }
}

/// Pattern queries the detection service runs against the graph store.
///
/// Each call receives a [`Deadline`] and must give up with
/// `ComputationOverrun` once it fires. Store failures surface as
/// `CollaboratorUnavailable`.
pub trait GraphQuery {
    /// Paths of `min_hops..=max_hops` money-flow edges that return to their origin.
    fn find_returning_paths(
        &self,
        min_hops: usize,
        max_hops: usize,
        deadline: &Deadline,
    ) -> Result<Vec<ReturningPath>>;

    /// Cards used at two different locations less than `window` apart.
    ///
    /// `distinct_location_count` counts the locations of both uses in each
    /// overlapping pair, not only the earlier one.
    fn find_card_location_overlaps(
        &self,
        window: chrono::Duration,
        deadline: &Deadline,
    ) -> Result<Vec<CardLocationOverlap>>;

    /// Identities used by two accounts joined by a `1..=max_hops` relationship path.
    fn find_shared_identity_loops(
        &self,
        max_hops: usize,
        deadline: &Deadline,
    ) -> Result<Vec<SharedIdentityLoop>>;

    /// Closed paths of `min_hops..=max_hops` edges labelled `relation_label`.
    fn find_closed_paths(
        &self,
        relation_label: &str,
        min_hops: usize,
        max_hops: usize,
        deadline: &Deadline,
    ) -> Result<Vec<ClosedPath>>;
}
