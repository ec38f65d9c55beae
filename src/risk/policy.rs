use crate::detection::record::FraudPattern;
use crate::risk::classifier::{RiskPolicy, Severity};
use serde::{Deserialize, Serialize};

/// How a pattern's severity and risk score are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// Derived from cycle length and total amount.
    Derived,
    /// Derived from cycle length alone.
    LengthOnly,
    /// Fixed by policy regardless of the cycle's shape.
    Fixed { severity: Severity, risk_score: f64 },
}

impl Classification {
    /// Apply this strategy to a cycle, returning `(severity, risk_score)`.
    pub fn classify(&self, risk: &RiskPolicy, cycle_length: usize, total_amount: f64) -> (Severity, f64) {
        match *self {
            Classification::Derived => (
                risk.severity(cycle_length, total_amount),
                risk.risk_score(cycle_length, total_amount),
            ),
            Classification::LengthOnly => (
                risk.severity_by_length(cycle_length),
                risk.risk_score_by_length(cycle_length),
            ),
            Classification::Fixed {
                severity,
                risk_score,
            } => (severity, risk_score),
        }
    }
}

/// Per-pattern classification table.
///
/// Card loops and identity loops are conclusive by construction, so they get
/// fixed scores; money flows are scored from their shape and amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternPolicy {
    pub circular_money_flow: Classification,
    pub credit_card_loop: Classification,
    pub identity_theft_loop: Classification,
    pub generic_cycle: Classification,
}

impl Default for PatternPolicy {
    fn default() -> Self {
        Self {
            circular_money_flow: Classification::Derived,
            credit_card_loop: Classification::Fixed {
                severity: Severity::High,
                risk_score: 0.9,
            },
            identity_theft_loop: Classification::Fixed {
                severity: Severity::High,
                risk_score: 0.85,
            },
            generic_cycle: Classification::LengthOnly,
        }
    }
}

impl PatternPolicy {
    pub fn classification(&self, pattern: FraudPattern) -> Classification {
        match pattern {
            FraudPattern::CircularMoneyFlow => self.circular_money_flow,
            FraudPattern::CreditCardLoop => self.credit_card_loop,
            FraudPattern::IdentityTheftLoop => self.identity_theft_loop,
            FraudPattern::GenericCycle => self.generic_cycle,
        }
    }

    pub fn classify(
        &self,
        pattern: FraudPattern,
        risk: &RiskPolicy,
        cycle_length: usize,
        total_amount: f64,
    ) -> (Severity, f64) {
        self.classification(pattern)
            .classify(risk, cycle_length, total_amount)
    }
}
