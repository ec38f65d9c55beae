use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cycles with at least this many accounts are HIGH severity.
pub const HIGH_LENGTH_THRESHOLD: usize = 5;
/// Cycles with at least this many accounts are at least MEDIUM severity.
pub const MEDIUM_LENGTH_THRESHOLD: usize = 3;
/// Amounts strictly above this are HIGH severity.
pub const HIGH_AMOUNT_THRESHOLD: f64 = 100_000.0;
/// Amounts strictly above this are at least MEDIUM severity.
pub const MEDIUM_AMOUNT_THRESHOLD: f64 = 50_000.0;
/// Length at which the length term of the risk score saturates.
pub const LENGTH_SATURATION: f64 = 10.0;
/// Amount at which the amount term of the risk score saturates.
pub const AMOUNT_SATURATION: f64 = 500_000.0;
pub const LENGTH_WEIGHT: f64 = 0.4;
pub const AMOUNT_WEIGHT: f64 = 0.6;
/// Scores at or above this are high risk.
pub const HIGH_RISK_SCORE: f64 = 0.8;
/// Scores at or above this (and below [`HIGH_RISK_SCORE`]) are medium risk.
pub const MEDIUM_RISK_SCORE: f64 = 0.5;

/// Severity label attached to a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Thresholds and weights for severity and risk scoring.
///
/// Defaults are the module constants; any of them may be overridden from
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub high_length_threshold: usize,
    pub medium_length_threshold: usize,
    pub high_amount_threshold: f64,
    pub medium_amount_threshold: f64,
    pub length_saturation: f64,
    pub amount_saturation: f64,
    pub length_weight: f64,
    pub amount_weight: f64,
    pub high_risk_score: f64,
    pub medium_risk_score: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            high_length_threshold: HIGH_LENGTH_THRESHOLD,
            medium_length_threshold: MEDIUM_LENGTH_THRESHOLD,
            high_amount_threshold: HIGH_AMOUNT_THRESHOLD,
            medium_amount_threshold: MEDIUM_AMOUNT_THRESHOLD,
            length_saturation: LENGTH_SATURATION,
            amount_saturation: AMOUNT_SATURATION,
            length_weight: LENGTH_WEIGHT,
            amount_weight: AMOUNT_WEIGHT,
            high_risk_score: HIGH_RISK_SCORE,
            medium_risk_score: MEDIUM_RISK_SCORE,
        }
    }
}

impl RiskPolicy {
    /// Severity from cycle length and the total amount moved.
    pub fn severity(&self, cycle_length: usize, total_amount: f64) -> Severity {
        if cycle_length >= self.high_length_threshold || total_amount > self.high_amount_threshold
        {
            Severity::High
        } else if cycle_length >= self.medium_length_threshold
            || total_amount > self.medium_amount_threshold
        {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Weighted risk score in `[0, 1]`.
    pub fn risk_score(&self, cycle_length: usize, total_amount: f64) -> f64 {
        self.length_term(cycle_length) * self.length_weight
            + saturate(total_amount, self.amount_saturation) * self.amount_weight
    }

    /// Severity for structural cycles where no amount is meaningful.
    pub fn severity_by_length(&self, cycle_length: usize) -> Severity {
        if cycle_length >= self.high_length_threshold {
            Severity::High
        } else if cycle_length >= self.medium_length_threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Length-only risk score: the saturated length term, unweighted.
    pub fn risk_score_by_length(&self, cycle_length: usize) -> f64 {
        self.length_term(cycle_length)
    }

    pub fn is_high_risk(&self, risk_score: f64, severity: Severity) -> bool {
        risk_score >= self.high_risk_score || severity == Severity::High
    }

    pub fn is_medium_risk(&self, risk_score: f64) -> bool {
        risk_score >= self.medium_risk_score && risk_score < self.high_risk_score
    }

    pub fn is_low_risk(&self, risk_score: f64) -> bool {
        risk_score < self.medium_risk_score
    }

    fn length_term(&self, cycle_length: usize) -> f64 {
        saturate(cycle_length as f64, self.length_saturation)
    }
}

/// `value / limit` clamped to `[0, 1]`. NaN counts as zero.
fn saturate(value: f64, limit: f64) -> f64 {
    let ratio = value / limit;
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_severity_boundaries() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.severity(5, 0.0), Severity::High);
        assert_eq!(policy.severity(2, 0.0), Severity::Low);
        assert_eq!(policy.severity(3, 60_000.0), Severity::Medium);
        assert_eq!(policy.severity(3, 0.0), Severity::Medium);
        assert_eq!(policy.severity(2, 100_000.0), Severity::Medium);
        assert_eq!(policy.severity(2, 100_000.01), Severity::High);
        assert_eq!(policy.severity(2, 50_000.0), Severity::Low);
    }

    #[test]
    fn test_risk_score_saturation() {
        let policy = RiskPolicy::default();
        assert_relative_eq!(policy.risk_score(10, 500_000.0), 1.0);
        assert_relative_eq!(policy.risk_score(0, 0.0), 0.0);
        assert_relative_eq!(policy.risk_score(20, 5_000_000.0), 1.0);
        assert_relative_eq!(policy.risk_score(5, 250_000.0), 0.5);
    }

    #[test]
    fn test_negative_amount_contributes_nothing() {
        let policy = RiskPolicy::default();
        assert_relative_eq!(policy.risk_score(4, -1_000_000.0), 0.16);
    }

    #[test]
    fn test_length_only_variant() {
        let policy = RiskPolicy::default();
        assert_eq!(policy.severity_by_length(4), Severity::Medium);
        assert_eq!(policy.severity_by_length(5), Severity::High);
        assert_eq!(policy.severity_by_length(2), Severity::Low);
        assert_relative_eq!(policy.risk_score_by_length(4), 0.4);
        assert_relative_eq!(policy.risk_score_by_length(12), 1.0);
    }

    #[test]
    fn test_risk_buckets() {
        let policy = RiskPolicy::default();
        assert!(policy.is_high_risk(0.8, Severity::Low));
        assert!(policy.is_high_risk(0.1, Severity::High));
        assert!(!policy.is_high_risk(0.79, Severity::Medium));
        assert!(policy.is_medium_risk(0.5));
        assert!(!policy.is_medium_risk(0.8));
        assert!(policy.is_low_risk(0.49));
        assert!(!policy.is_low_risk(0.5));
    }

    #[test]
    fn test_overridden_thresholds() {
        let policy = RiskPolicy {
            high_length_threshold: 3,
            ..RiskPolicy::default()
        };
        assert_eq!(policy.severity(3, 0.0), Severity::High);
    }

    #[test]
    fn test_severity_strings() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"HIGH\"");
        assert_eq!("MEDIUM".parse::<Severity>().unwrap(), Severity::Medium);
        assert!("medium".parse::<Severity>().is_err());
        assert!(Severity::High > Severity::Low);
    }
}
