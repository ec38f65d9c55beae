use crate::core::account::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relation label used when an edge is added without one.
pub const DEFAULT_LABEL: &str = "TRANSFER";

/// A directed, weighted edge between two accounts.
///
/// The weight is usually a transaction amount but may be any cost; its sign
/// matters for negative-cycle detection. Repeated transactions between the
/// same pair are separate edges, each with its own id.
///
/// # Examples
///
/// ```
/// use cycle_sentinel::core::account::AccountId;
/// use cycle_sentinel::core::transaction::TransactionEdge;
///
/// let edge = TransactionEdge::new(AccountId::new("A"), AccountId::new("B"), 250.0)
///     .with_label("TRANSACTION");
///
/// assert_eq!(edge.weight(), 250.0);
/// assert_eq!(edge.label(), "TRANSACTION");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEdge {
    id: Uuid,
    from: AccountId,
    to: AccountId,
    weight: f64,
    /// Relation type, e.g. `TRANSFER` or `HAS_RELATIONSHIP`.
    label: String,
    timestamp: Option<DateTime<Utc>>,
}

impl TransactionEdge {
    pub fn new(from: AccountId, to: AccountId, weight: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            weight,
            label: DEFAULT_LABEL.to_string(),
            timestamp: None,
        }
    }

    /// Create an edge with a specific ID (useful for testing / determinism).
    pub fn with_id(id: Uuid, from: AccountId, to: AccountId, weight: f64) -> Self {
        Self {
            id,
            ..Self::new(from, to, weight)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn from(&self) -> &AccountId {
        &self.from
    }

    pub fn to(&self) -> &AccountId {
        &self.to
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_defaults() {
        let edge = TransactionEdge::new(AccountId::new("A"), AccountId::new("B"), -3.5);
        assert_eq!(edge.from().as_str(), "A");
        assert_eq!(edge.to().as_str(), "B");
        assert_eq!(edge.weight(), -3.5);
        assert_eq!(edge.label(), DEFAULT_LABEL);
        assert!(edge.timestamp().is_none());
        assert!(!edge.is_self_loop());
    }

    #[test]
    fn test_repeated_edges_get_distinct_ids() {
        let a = TransactionEdge::new(AccountId::new("A"), AccountId::new("B"), 1.0);
        let b = TransactionEdge::new(AccountId::new("A"), AccountId::new("B"), 1.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_edge_json_shape() {
        let ts = Utc::now();
        let edge = TransactionEdge::new(AccountId::new("A"), AccountId::new("B"), 10.0)
            .with_label("TRANSACTION")
            .with_timestamp(ts);
        let value: serde_json::Value = serde_json::to_value(&edge).unwrap();
        assert_eq!(value["from"], "A");
        assert_eq!(value["to"], "B");
        assert_eq!(value["label"], "TRANSACTION");
        assert!(value["timestamp"].is_string());
    }
}
