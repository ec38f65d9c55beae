use crate::core::account::AccountId;
use crate::risk::classifier::{RiskPolicy, Severity};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of fraud a detected cycle indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudPattern {
    /// Money leaves an account and returns to it through intermediaries.
    CircularMoneyFlow,
    /// A card used at distinct locations within an impossible timeframe.
    CreditCardLoop,
    /// Shared identity information across related accounts.
    IdentityTheftLoop,
    /// Any closed path over a named relation.
    GenericCycle,
}

impl FraudPattern {
    pub const ALL: [FraudPattern; 4] = [
        FraudPattern::CircularMoneyFlow,
        FraudPattern::CreditCardLoop,
        FraudPattern::IdentityTheftLoop,
        FraudPattern::GenericCycle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FraudPattern::CircularMoneyFlow => "CIRCULAR_MONEY_FLOW",
            FraudPattern::CreditCardLoop => "CREDIT_CARD_LOOP",
            FraudPattern::IdentityTheftLoop => "IDENTITY_THEFT_LOOP",
            FraudPattern::GenericCycle => "GENERIC_CYCLE",
        }
    }
}

impl fmt::Display for FraudPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FraudPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown fraud pattern: {}", s))
    }
}

/// Investigation lifecycle of a detection.
///
/// ```text
/// DETECTED ──► INVESTIGATING ──► CONFIRMED ──► RESOLVED
///     │                ╰─────────────────────────▲
///     ╰──────────────────────────► CONFIRMED / RESOLVED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CycleStatus {
    Detected,
    Investigating,
    Confirmed,
    Resolved,
}

impl CycleStatus {
    pub const ALL: [CycleStatus; 4] = [
        CycleStatus::Detected,
        CycleStatus::Investigating,
        CycleStatus::Confirmed,
        CycleStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Detected => "DETECTED",
            CycleStatus::Investigating => "INVESTIGATING",
            CycleStatus::Confirmed => "CONFIRMED",
            CycleStatus::Resolved => "RESOLVED",
        }
    }

    /// Whether the workflow permits moving from `self` to `next`.
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(&self, next: CycleStatus) -> bool {
        use CycleStatus::*;
        match (*self, next) {
            (a, b) if a == b => true,
            (Detected, Investigating | Confirmed | Resolved) => true,
            (Investigating, Confirmed | Resolved) => true,
            (Confirmed, Resolved) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == CycleStatus::Resolved
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown cycle status: {}", s))
    }
}

/// Unique identifier of a detection, `CYCLE_<epoch-millis>_<0..9999>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(String);

impl CycleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh id from the current time and a random suffix.
    pub fn generate() -> Self {
        let suffix = rand::thread_rng().gen_range(0..10_000);
        Self(format!("CYCLE_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CycleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Classification labels that workflows attach to a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagKind {
    FraudType,
    DetectionMethod,
    FraudIndicator,
}

/// A persisted cycle detection.
///
/// `cycle_id`, `fraud_pattern` and `detected_at` are fixed at construction.
/// Severity and risk score change only through [`reclassify`](Self::reclassify),
/// and status only through [`set_status`](Self::set_status) under the
/// workflow's transition rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleDetection {
    cycle_id: CycleId,
    fraud_pattern: FraudPattern,
    description: String,
    cycle_length: usize,
    total_amount: f64,
    severity: Severity,
    risk_score: f64,
    status: CycleStatus,
    #[serde(with = "accounts_serde")]
    affected_accounts: Vec<AccountId>,
    detected_at: DateTime<Utc>,
    #[serde(default)]
    version: u64,
    #[serde(default)]
    fraud_types: BTreeSet<String>,
    #[serde(default)]
    detection_methods: BTreeSet<String>,
    #[serde(default)]
    indicators: BTreeSet<String>,
}

/// `affectedAccounts` travels as a comma-delimited string.
mod accounts_serde {
    use super::*;
    use serde::de::{self, Visitor};

    pub fn serialize<S: serde::Serializer>(
        accounts: &[AccountId],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let joined = accounts
            .iter()
            .map(AccountId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<AccountId>, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = Vec<AccountId>;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a comma-delimited list of account ids")
            }
            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(super::parse_accounts(value))
            }
        }
        deserializer.deserialize_str(V)
    }
}

/// Split a comma-delimited account list, trimming blanks.
pub fn parse_accounts(value: &str) -> Vec<AccountId> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(AccountId::new)
        .collect()
}

impl CycleDetection {
    /// A new record in `DETECTED` state, stamped now, at version 0.
    pub fn new(
        fraud_pattern: FraudPattern,
        description: impl Into<String>,
        cycle_length: usize,
        total_amount: f64,
        severity: Severity,
        risk_score: f64,
    ) -> Self {
        Self {
            cycle_id: CycleId::generate(),
            fraud_pattern,
            description: description.into(),
            cycle_length,
            total_amount,
            severity,
            risk_score,
            status: CycleStatus::Detected,
            affected_accounts: Vec::new(),
            detected_at: Utc::now(),
            version: 0,
            fraud_types: BTreeSet::new(),
            detection_methods: BTreeSet::new(),
            indicators: BTreeSet::new(),
        }
    }

    pub fn with_affected_accounts(mut self, accounts: Vec<AccountId>) -> Self {
        self.affected_accounts = accounts;
        self
    }

    /// Replace the id, e.g. after a collision in the store.
    pub fn with_cycle_id(mut self, id: CycleId) -> Self {
        self.cycle_id = id;
        self
    }

    pub fn with_detected_at(mut self, at: DateTime<Utc>) -> Self {
        self.detected_at = at;
        self
    }

    // --- Accessors ---

    pub fn cycle_id(&self) -> &CycleId {
        &self.cycle_id
    }

    pub fn fraud_pattern(&self) -> FraudPattern {
        self.fraud_pattern
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cycle_length(&self) -> usize {
        self.cycle_length
    }

    pub fn total_amount(&self) -> f64 {
        self.total_amount
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn status(&self) -> CycleStatus {
        self.status
    }

    pub fn affected_accounts(&self) -> &[AccountId] {
        &self.affected_accounts
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    /// Optimistic-concurrency token. Stores bump it on every successful save.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set by [`DetectionStore`](crate::detection::store::DetectionStore)
    /// implementations when a save succeeds.
    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn tags(&self, kind: TagKind) -> &BTreeSet<String> {
        match kind {
            TagKind::FraudType => &self.fraud_types,
            TagKind::DetectionMethod => &self.detection_methods,
            TagKind::FraudIndicator => &self.indicators,
        }
    }

    pub fn has_fraud_type(&self, name: &str) -> bool {
        self.fraud_types.contains(name)
    }

    // --- Mutations ---

    pub fn reclassify(&mut self, severity: Severity, risk_score: f64) {
        self.severity = severity;
        self.risk_score = risk_score;
    }

    /// Move to `next`, returning the previous status if the workflow allows it.
    pub fn set_status(&mut self, next: CycleStatus) -> Result<CycleStatus, CycleStatus> {
        if !self.status.can_transition_to(next) {
            return Err(self.status);
        }
        Ok(std::mem::replace(&mut self.status, next))
    }

    /// Attach a label; returns false if it was already present.
    pub fn add_tag(&mut self, kind: TagKind, name: impl Into<String>) -> bool {
        let set = match kind {
            TagKind::FraudType => &mut self.fraud_types,
            TagKind::DetectionMethod => &mut self.detection_methods,
            TagKind::FraudIndicator => &mut self.indicators,
        };
        set.insert(name.into())
    }

    // --- Risk buckets ---

    pub fn is_high_risk(&self, policy: &RiskPolicy) -> bool {
        policy.is_high_risk(self.risk_score, self.severity)
    }

    pub fn is_medium_risk(&self, policy: &RiskPolicy) -> bool {
        policy.is_medium_risk(self.risk_score)
    }

    pub fn is_low_risk(&self, policy: &RiskPolicy) -> bool {
        policy.is_low_risk(self.risk_score)
    }
}
