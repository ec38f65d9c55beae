//! Read-side reductions over detection records.
//!
//! Every report here is a pure function of the records passed in. Order of the
//! input does not matter and an empty input yields zeroed totals.

use crate::core::account::AccountId;
use crate::detection::record::{CycleDetection, CycleId, CycleStatus, FraudPattern};
use crate::graph::analysis::rank_by_frequency;
use crate::risk::classifier::{RiskPolicy, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Action attached to every high-risk alert.
pub const IMMEDIATE_INVESTIGATION: &str = "IMMEDIATE_INVESTIGATION";

fn count_by<K: Ord>(records: &[CycleDetection], key: impl Fn(&CycleDetection) -> K) -> BTreeMap<K, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(key(record)).or_insert(0) += 1;
    }
    counts
}

fn total_amount(records: &[CycleDetection]) -> f64 {
    records.iter().map(CycleDetection::total_amount).sum()
}

fn mean(records: &[CycleDetection], value: impl Fn(&CycleDetection) -> f64) -> f64 {
    if records.is_empty() {
        0.0
    } else {
        records.iter().map(value).sum::<f64>() / records.len() as f64
    }
}

/// Overview of every detection on record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudDetectionReport {
    pub total_cycles_detected: usize,
    pub detection_time: DateTime<Utc>,
    pub high_risk_cycles: usize,
    pub medium_risk_cycles: usize,
    pub low_risk_cycles: usize,
    pub total_amount_at_risk: f64,
    pub fraud_pattern_distribution: BTreeMap<FraudPattern, usize>,
    pub status_distribution: BTreeMap<CycleStatus, usize>,
}

impl FraudDetectionReport {
    pub fn from_detections(records: &[CycleDetection], policy: &RiskPolicy) -> Self {
        Self {
            total_cycles_detected: records.len(),
            detection_time: Utc::now(),
            high_risk_cycles: records.iter().filter(|d| d.is_high_risk(policy)).count(),
            medium_risk_cycles: records.iter().filter(|d| d.is_medium_risk(policy)).count(),
            low_risk_cycles: records.iter().filter(|d| d.is_low_risk(policy)).count(),
            total_amount_at_risk: total_amount(records),
            fraud_pattern_distribution: count_by(records, CycleDetection::fraud_pattern),
            status_distribution: count_by(records, CycleDetection::status),
        }
    }
}

impl std::fmt::Display for FraudDetectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Fraud Detection Report ===")?;
        writeln!(f, "Generated:        {}", self.detection_time.to_rfc3339())?;
        writeln!(f, "Cycles detected:  {}", self.total_cycles_detected)?;
        writeln!(f, "High risk:        {}", self.high_risk_cycles)?;
        writeln!(f, "Medium risk:      {}", self.medium_risk_cycles)?;
        writeln!(f, "Low risk:         {}", self.low_risk_cycles)?;
        writeln!(f, "Amount at risk:   {:.2}", self.total_amount_at_risk)?;

        if !self.fraud_pattern_distribution.is_empty() {
            writeln!(f, "\n--- By pattern ---")?;
            for (pattern, count) in &self.fraud_pattern_distribution {
                writeln!(f, "  {:<22} {}", pattern, count)?;
            }
        }
        if !self.status_distribution.is_empty() {
            writeln!(f, "\n--- By status ---")?;
            for (status, count) in &self.status_distribution {
                writeln!(f, "  {:<22} {}", status, count)?;
            }
        }
        Ok(())
    }
}

/// Regulatory summary of the full detection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub report_timestamp: DateTime<Utc>,
    pub total_cycles_detected: usize,
    pub status_breakdown: BTreeMap<CycleStatus, usize>,
    pub high_risk_cycles: usize,
    pub total_amount_at_risk: f64,
    pub confirmed_fraud_cases: usize,
    pub confirmed_fraud_amount: f64,
    pub average_risk_score: f64,
    pub fraud_pattern_breakdown: BTreeMap<FraudPattern, usize>,
}

impl ComplianceReport {
    pub fn from_detections(records: &[CycleDetection], policy: &RiskPolicy) -> Self {
        let confirmed: Vec<CycleDetection> = records
            .iter()
            .filter(|d| d.status() == CycleStatus::Confirmed)
            .cloned()
            .collect();
        Self {
            report_timestamp: Utc::now(),
            total_cycles_detected: records.len(),
            status_breakdown: count_by(records, CycleDetection::status),
            high_risk_cycles: records.iter().filter(|d| d.is_high_risk(policy)).count(),
            total_amount_at_risk: total_amount(records),
            confirmed_fraud_cases: confirmed.len(),
            confirmed_fraud_amount: total_amount(&confirmed),
            average_risk_score: mean(records, CycleDetection::risk_score),
            fraud_pattern_breakdown: count_by(records, CycleDetection::fraud_pattern),
        }
    }
}

/// What was detected over a recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentFraudSummary {
    pub hours_back: u32,
    pub total_cycles: usize,
    pub pattern_distribution: BTreeMap<FraudPattern, usize>,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub total_amount_at_risk: f64,
    /// Accounts implicated most often, most frequent first.
    pub top_suspect_accounts: Vec<AccountId>,
}

impl RecentFraudSummary {
    /// Summarise `recent`, which should already be limited to the last `hours`.
    pub fn from_detections(recent: &[CycleDetection], hours: u32, top_n: usize) -> Self {
        let mut frequency: BTreeMap<AccountId, usize> = BTreeMap::new();
        for record in recent {
            for account in record.affected_accounts() {
                *frequency.entry(account.clone()).or_insert(0) += 1;
            }
        }
        Self {
            hours_back: hours,
            total_cycles: recent.len(),
            pattern_distribution: count_by(recent, CycleDetection::fraud_pattern),
            severity_distribution: count_by(recent, CycleDetection::severity),
            total_amount_at_risk: total_amount(recent),
            top_suspect_accounts: rank_by_frequency(frequency, top_n),
        }
    }
}

/// Counts per risk bucket. The high bucket also admits HIGH severity, so the
/// buckets may overlap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudTrends {
    /// `None` when there are no detections. Ties go to the earlier pattern.
    pub most_common_pattern: Option<FraudPattern>,
    pub average_cycle_length: f64,
    pub average_transaction_amount: f64,
    pub risk_distribution: RiskDistribution,
    /// Share of detections confirmed as fraud, in `[0, 1]`.
    pub confirmed_fraud_rate: f64,
}

impl FraudTrends {
    pub fn from_detections(records: &[CycleDetection], policy: &RiskPolicy) -> Self {
        let patterns = count_by(records, CycleDetection::fraud_pattern);
        let most_common_pattern = patterns
            .iter()
            .fold(None, |best: Option<(FraudPattern, usize)>, (&p, &n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((p, n)),
            })
            .map(|(p, _)| p);

        let confirmed = records
            .iter()
            .filter(|d| d.status() == CycleStatus::Confirmed)
            .count();

        Self {
            most_common_pattern,
            average_cycle_length: mean(records, |d| d.cycle_length() as f64),
            average_transaction_amount: mean(records, CycleDetection::total_amount),
            risk_distribution: RiskDistribution {
                high: records.iter().filter(|d| d.is_high_risk(policy)).count(),
                medium: records.iter().filter(|d| d.is_medium_risk(policy)).count(),
                low: records.iter().filter(|d| d.is_low_risk(policy)).count(),
            },
            confirmed_fraud_rate: if records.is_empty() {
                0.0
            } else {
                confirmed as f64 / records.len() as f64
            },
        }
    }
}

/// A high-risk detection needing immediate attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighRiskAlert {
    pub alert_id: CycleId,
    pub severity: Severity,
    pub risk_score: f64,
    pub fraud_pattern: FraudPattern,
    pub total_amount: f64,
    pub cycle_length: usize,
    pub affected_accounts: Vec<AccountId>,
    pub detected_at: DateTime<Utc>,
    pub action_required: String,
}

/// Alerts for every high-risk record, in input order.
pub fn high_risk_alerts(records: &[CycleDetection], policy: &RiskPolicy) -> Vec<HighRiskAlert> {
    records
        .iter()
        .filter(|d| d.is_high_risk(policy))
        .map(|d| HighRiskAlert {
            alert_id: d.cycle_id().clone(),
            severity: d.severity(),
            risk_score: d.risk_score(),
            fraud_pattern: d.fraud_pattern(),
            total_amount: d.total_amount(),
            cycle_length: d.cycle_length(),
            affected_accounts: d.affected_accounts().to_vec(),
            detected_at: d.detected_at(),
            action_required: IMMEDIATE_INVESTIGATION.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(pattern: FraudPattern, amount: f64, severity: Severity, risk: f64) -> CycleDetection {
        CycleDetection::new(pattern, "test", 4, amount, severity, risk)
    }

    fn sample() -> Vec<CycleDetection> {
        let mut confirmed = record(FraudPattern::CreditCardLoop, 300.0, Severity::High, 0.9)
            .with_affected_accounts(vec![AccountId::new("CARD-1")]);
        confirmed.set_status(CycleStatus::Confirmed).unwrap();
        vec![
            record(FraudPattern::CircularMoneyFlow, 1_000.0, Severity::Medium, 0.6)
                .with_affected_accounts(vec![AccountId::new("A")]),
            record(FraudPattern::CircularMoneyFlow, 2_000.0, Severity::Low, 0.2)
                .with_affected_accounts(vec![AccountId::new("A"), AccountId::new("B")]),
            confirmed,
        ]
    }

    #[test]
    fn test_empty_report() {
        let report = FraudDetectionReport::from_detections(&[], &RiskPolicy::default());
        assert_eq!(report.total_cycles_detected, 0);
        assert_eq!(report.total_amount_at_risk, 0.0);
        assert!(report.fraud_pattern_distribution.is_empty());
        assert!(report.status_distribution.is_empty());
    }

    #[test]
    fn test_report_counts() {
        let report = FraudDetectionReport::from_detections(&sample(), &RiskPolicy::default());
        assert_eq!(report.total_cycles_detected, 3);
        assert_eq!(report.high_risk_cycles, 1);
        assert_eq!(report.medium_risk_cycles, 1);
        assert_eq!(report.low_risk_cycles, 1);
        assert_relative_eq!(report.total_amount_at_risk, 3_300.0);
        assert_eq!(report.fraud_pattern_distribution[&FraudPattern::CircularMoneyFlow], 2);
        assert_eq!(report.status_distribution[&CycleStatus::Confirmed], 1);
    }

    #[test]
    fn test_report_is_order_independent() {
        let mut records = sample();
        let policy = RiskPolicy::default();
        let forward = FraudDetectionReport::from_detections(&records, &policy);
        records.reverse();
        let backward = FraudDetectionReport::from_detections(&records, &policy);
        assert_eq!(forward.fraud_pattern_distribution, backward.fraud_pattern_distribution);
        assert_eq!(forward.status_distribution, backward.status_distribution);
        assert_eq!(forward.high_risk_cycles, backward.high_risk_cycles);
    }

    #[test]
    fn test_report_json_keys() {
        let report = FraudDetectionReport::from_detections(&sample(), &RiskPolicy::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalCyclesDetected"], 3);
        assert_eq!(json["fraudPatternDistribution"]["CIRCULAR_MONEY_FLOW"], 2);
        assert_eq!(json["statusDistribution"]["DETECTED"], 2);
    }

    #[test]
    fn test_compliance_report() {
        let report = ComplianceReport::from_detections(&sample(), &RiskPolicy::default());
        assert_eq!(report.confirmed_fraud_cases, 1);
        assert_relative_eq!(report.confirmed_fraud_amount, 300.0);
        assert_relative_eq!(report.average_risk_score, (0.6 + 0.2 + 0.9) / 3.0);
    }

    #[test]
    fn test_recent_summary_suspects() {
        let summary = RecentFraudSummary::from_detections(&sample(), 24, 2);
        assert_eq!(summary.total_cycles, 3);
        assert_eq!(
            summary.top_suspect_accounts,
            vec![AccountId::new("A"), AccountId::new("B")]
        );
        assert_eq!(summary.severity_distribution[&Severity::High], 1);
    }

    #[test]
    fn test_trends() {
        let trends = FraudTrends::from_detections(&sample(), &RiskPolicy::default());
        assert_eq!(trends.most_common_pattern, Some(FraudPattern::CircularMoneyFlow));
        assert_relative_eq!(trends.average_cycle_length, 4.0);
        assert_relative_eq!(trends.confirmed_fraud_rate, 1.0 / 3.0);

        let empty = FraudTrends::from_detections(&[], &RiskPolicy::default());
        assert_eq!(empty.most_common_pattern, None);
        assert_eq!(empty.confirmed_fraud_rate, 0.0);
    }

    #[test]
    fn test_high_risk_alerts() {
        let alerts = high_risk_alerts(&sample(), &RiskPolicy::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].action_required, IMMEDIATE_INVESTIGATION);
        assert_eq!(alerts[0].fraud_pattern, FraudPattern::CreditCardLoop);
    }
}
