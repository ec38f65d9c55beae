use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for an account (or any entity) in the transaction graph.
///
/// Accounts carry no state beyond identity. Ordering is lexicographic so that
/// graph traversals and reports come out in a reproducible order.
///
/// # Examples
///
/// ```
/// use cycle_sentinel::core::account::AccountId;
///
/// let alice = AccountId::new("ACC-001");
/// let bob = AccountId::new("ACC-002");
/// assert!(alice < bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
