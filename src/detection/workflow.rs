//! Multi-step investigation workflows built on the detection service.

use crate::core::error::Result;
use crate::detection::query::GraphQuery;
use crate::detection::record::{CycleDetection, CycleId, CycleStatus, FraudPattern, TagKind};
use crate::detection::report::{
    high_risk_alerts, ComplianceReport, FraudDetectionReport, FraudTrends, HighRiskAlert,
    RecentFraudSummary,
};
use crate::detection::service::{CycleDetectionService, FailedDetection};
use crate::detection::store::DetectionStore;
use serde::{Deserialize, Serialize};

/// Fraud type attached to high-risk circular flows.
pub const MONEY_LAUNDERING: &str = "Money Laundering";
/// Fraud type attached to identity loops.
pub const IDENTITY_THEFT: &str = "Identity Theft";

/// A workflow step that failed for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub cycle_id: CycleId,
    pub step: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmlWorkflowResult {
    pub total_cycles_detected: usize,
    pub high_risk_count: usize,
    pub medium_risk_count: usize,
    pub moved_to_investigating: usize,
    pub linked_to_fraud_type: usize,
    pub rejected_detections: Vec<FailedDetection>,
    pub failed_steps: Vec<FailedStep>,
    pub report: FraudDetectionReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardWorkflowResult {
    pub cycles_detected: usize,
    pub cycles_confirmed: usize,
    pub confirmed: Vec<CycleDetection>,
    pub rejected_detections: Vec<FailedDetection>,
    pub failed_steps: Vec<FailedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityWorkflowResult {
    pub cycles_detected: usize,
    pub linked_to_fraud_type: usize,
    pub moved_to_investigating: usize,
    pub rejected_detections: Vec<FailedDetection>,
    pub failed_steps: Vec<FailedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnalysis {
    pub pattern: FraudPattern,
    pub total_cycles: usize,
    /// Records still in `DETECTED` that were re-scored.
    pub cycles_analyzed: usize,
    pub total_amount_involved: f64,
    pub average_risk_score: f64,
    pub failed_steps: Vec<FailedStep>,
}

/// Run `step` for one record, counting successes and collecting failures.
fn track<T>(
    failures: &mut Vec<FailedStep>,
    id: &CycleId,
    step: &str,
    outcome: Result<T>,
) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("{} failed for {}: {}", step, id, e);
            failures.push(FailedStep {
                cycle_id: id.clone(),
                step: step.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}

impl<Q: GraphQuery, S: DetectionStore> CycleDetectionService<Q, S> {
    /// Anti-money-laundering sweep.
    ///
    /// Detects circular flows, moves the high-risk ones to `INVESTIGATING`,
    /// tags them as money laundering and reports on the whole store.
    pub fn run_aml_workflow(&self) -> Result<AmlWorkflowResult> {
        let batch = self.detect_circular_money_flows()?;
        let risk = &self.config().risk;

        let (high, rest): (Vec<&CycleDetection>, Vec<&CycleDetection>) =
            batch.saved.iter().partition(|d| d.is_high_risk(risk));
        let medium_risk_count = rest.iter().filter(|d| d.is_medium_risk(risk)).count();

        let mut failed_steps = Vec::new();
        let mut moved = 0;
        let mut linked = 0;
        for cycle in &high {
            let id = cycle.cycle_id();
            let status = self.update_cycle_status(id, CycleStatus::Investigating);
            if track(&mut failed_steps, id, "update status", status).is_some() {
                moved += 1;
            }
            let tagged = self.tag_cycle(id, TagKind::FraudType, MONEY_LAUNDERING);
            if track(&mut failed_steps, id, "tag", tagged).is_some() {
                linked += 1;
            }
        }

        let report = self.generate_fraud_detection_report()?;
        log::info!(
            "AML workflow: {} flows, {} high risk moved to investigating",
            batch.saved.len(),
            moved
        );

        Ok(AmlWorkflowResult {
            total_cycles_detected: batch.saved.len(),
            high_risk_count: high.len(),
            medium_risk_count,
            moved_to_investigating: moved,
            linked_to_fraud_type: linked,
            rejected_detections: batch.failed,
            failed_steps,
            report,
        })
    }

    /// Card fraud sweep. Impossible travel is treated as conclusive, so every
    /// loop is confirmed and then re-scored.
    pub fn run_credit_card_workflow(&self) -> Result<CardWorkflowResult> {
        let batch = self.detect_credit_card_fraud_loops()?;

        let mut failed_steps = Vec::new();
        let mut confirmed = Vec::new();
        for cycle in &batch.saved {
            let id = cycle.cycle_id();
            let status = self.update_cycle_status(id, CycleStatus::Confirmed);
            if track(&mut failed_steps, id, "update status", status).is_none() {
                continue;
            }
            let analyzed = self.analyze_cycle(id);
            if let Some(record) = track(&mut failed_steps, id, "analyze", analyzed) {
                confirmed.push(record);
            }
        }

        Ok(CardWorkflowResult {
            cycles_detected: batch.saved.len(),
            cycles_confirmed: confirmed.len(),
            confirmed,
            rejected_detections: batch.failed,
            failed_steps,
        })
    }

    /// Identity theft sweep: tag every loop and move it to `INVESTIGATING`.
    pub fn run_identity_theft_workflow(&self) -> Result<IdentityWorkflowResult> {
        let batch = self.detect_identity_theft_loops()?;

        let mut failed_steps = Vec::new();
        let mut linked = 0;
        let mut moved = 0;
        for cycle in &batch.saved {
            let id = cycle.cycle_id();
            let tagged = self.tag_cycle(id, TagKind::FraudType, IDENTITY_THEFT);
            if track(&mut failed_steps, id, "tag", tagged).is_some() {
                linked += 1;
            }
            let status = self.update_cycle_status(id, CycleStatus::Investigating);
            if track(&mut failed_steps, id, "update status", status).is_some() {
                moved += 1;
            }
        }

        Ok(IdentityWorkflowResult {
            cycles_detected: batch.saved.len(),
            linked_to_fraud_type: linked,
            moved_to_investigating: moved,
            rejected_detections: batch.failed,
            failed_steps,
        })
    }

    /// Re-score every `DETECTED` record of `pattern`.
    pub fn batch_analyze(&self, pattern: FraudPattern) -> Result<BatchAnalysis> {
        let cycles = self.cycles_by_pattern(pattern)?;

        let mut failed_steps = Vec::new();
        let mut analyzed = 0;
        for cycle in cycles.iter().filter(|c| c.status() == CycleStatus::Detected) {
            let id = cycle.cycle_id();
            if track(&mut failed_steps, id, "analyze", self.analyze_cycle(id)).is_some() {
                analyzed += 1;
            }
        }

        let total_amount_involved = cycles.iter().map(CycleDetection::total_amount).sum();
        let average_risk_score = if cycles.is_empty() {
            0.0
        } else {
            cycles.iter().map(CycleDetection::risk_score).sum::<f64>() / cycles.len() as f64
        };

        Ok(BatchAnalysis {
            pattern,
            total_cycles: cycles.len(),
            cycles_analyzed: analyzed,
            total_amount_involved,
            average_risk_score,
            failed_steps,
        })
    }

    pub fn compliance_report(&self) -> Result<ComplianceReport> {
        let all = self.all_cycles()?;
        Ok(ComplianceReport::from_detections(&all, &self.config().risk))
    }

    pub fn recent_fraud_summary(&self, hours: u32) -> Result<RecentFraudSummary> {
        let recent = self.recent_cycles(hours)?;
        Ok(RecentFraudSummary::from_detections(
            &recent,
            hours,
            self.config().detection.top_suspects,
        ))
    }

    pub fn fraud_trends(&self) -> Result<FraudTrends> {
        let all = self.all_cycles()?;
        Ok(FraudTrends::from_detections(&all, &self.config().risk))
    }

    /// Alerts for high-risk records, highest risk first.
    pub fn high_risk_alerts(&self) -> Result<Vec<HighRiskAlert>> {
        let high = self.high_risk_cycles()?;
        Ok(high_risk_alerts(&high, &self.config().risk))
    }
}
