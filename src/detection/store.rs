use crate::core::error::{DetectionError, Result};
use crate::detection::record::{CycleDetection, CycleId, CycleStatus, FraudPattern};
use crate::risk::classifier::RiskPolicy;
use chrono::{Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

const COLLABORATOR: &str = "detection store";

/// Persistence sink for detection records.
///
/// `save` is version-checked: a record is accepted only if its `version`
/// matches the stored one (0 for a record not yet stored), and the stored copy
/// comes back with the version bumped. A mismatch is `VersionConflict`.
///
/// Only the three required methods touch storage; the filtered reads default
/// to filtering [`find_all`](Self::find_all) and may be overridden with
/// native queries.
pub trait DetectionStore {
    fn save(&self, record: CycleDetection) -> Result<CycleDetection>;

    fn find_by_id(&self, id: &CycleId) -> Result<Option<CycleDetection>>;

    /// Every record, newest first.
    fn find_all(&self) -> Result<Vec<CycleDetection>>;

    fn find_by_pattern(&self, pattern: FraudPattern) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.fraud_pattern() == pattern);
        Ok(all)
    }

    /// High-risk records, highest score first.
    fn find_high_risk(&self, policy: &RiskPolicy) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.is_high_risk(policy));
        all.sort_by(by_risk_desc);
        Ok(all)
    }

    /// Medium-risk records, highest score first.
    fn find_medium_risk(&self, policy: &RiskPolicy) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.is_medium_risk(policy));
        all.sort_by(by_risk_desc);
        Ok(all)
    }

    /// Records in `status`, newest first.
    fn find_by_status(&self, status: CycleStatus) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.status() == status);
        Ok(all)
    }

    /// Records detected within the last `hours`, newest first.
    fn find_recent(&self, hours: u32) -> Result<Vec<CycleDetection>> {
        let cutoff = Utc::now() - Duration::hours(i64::from(hours));
        let mut all = self.find_all()?;
        all.retain(|d| d.detected_at() > cutoff);
        Ok(all)
    }

    /// Confirmed records, largest amount first.
    fn find_confirmed(&self) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_by_status(CycleStatus::Confirmed)?;
        all.sort_by(by_amount_desc);
        Ok(all)
    }

    /// Records of exactly `length`, highest score first.
    fn find_by_cycle_length(&self, length: usize) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.cycle_length() == length);
        all.sort_by(by_risk_desc);
        Ok(all)
    }

    /// Records moving strictly more than `threshold`, largest first.
    fn find_by_total_amount_greater_than(&self, threshold: f64) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.total_amount() > threshold);
        all.sort_by(by_amount_desc);
        Ok(all)
    }

    fn find_by_fraud_type(&self, name: &str) -> Result<Vec<CycleDetection>> {
        let mut all = self.find_all()?;
        all.retain(|d| d.has_fraud_type(name));
        Ok(all)
    }

    fn count_by_pattern(&self, pattern: FraudPattern) -> Result<usize> {
        Ok(self.find_by_pattern(pattern)?.len())
    }
}

fn by_risk_desc(a: &CycleDetection, b: &CycleDetection) -> Ordering {
    b.risk_score().total_cmp(&a.risk_score())
}

fn by_amount_desc(a: &CycleDetection, b: &CycleDetection) -> Ordering {
    b.total_amount().total_cmp(&a.total_amount())
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryDetectionStore {
    records: RwLock<HashMap<CycleId, CycleDetection>>,
}

impl InMemoryDetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records. Fails like the other reads if the lock
    /// was poisoned.
    pub fn len(&self) -> Result<usize> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn poisoned<T>(_: T) -> DetectionError {
    DetectionError::unavailable(COLLABORATOR, "lock poisoned")
}

impl DetectionStore for InMemoryDetectionStore {
    fn save(&self, mut record: CycleDetection) -> Result<CycleDetection> {
        let mut records = self.records.write().map_err(poisoned)?;
        let stored_version = records
            .get(record.cycle_id())
            .map_or(0, CycleDetection::version);

        if record.version() != stored_version {
            return Err(DetectionError::VersionConflict {
                id: record.cycle_id().to_string(),
                expected: record.version(),
                found: stored_version,
            });
        }

        record.set_version(stored_version + 1);
        records.insert(record.cycle_id().clone(), record.clone());
        Ok(record)
    }

    fn find_by_id(&self, id: &CycleId) -> Result<Option<CycleDetection>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(id).cloned())
    }

    fn find_all(&self) -> Result<Vec<CycleDetection>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut all: Vec<CycleDetection> = records.values().cloned().collect();
        all.sort_by(|a, b| {
            b.detected_at()
                .cmp(&a.detected_at())
                .then_with(|| a.cycle_id().cmp(b.cycle_id()))
        });
        Ok(all)
    }
}
