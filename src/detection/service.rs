use crate::config::EngineConfig;
use crate::core::account::AccountId;
use crate::core::error::{DetectionError, Result};
use crate::detection::query::GraphQuery;
use crate::detection::record::{CycleDetection, CycleId, CycleStatus, FraudPattern, TagKind};
use crate::detection::report::FraudDetectionReport;
use crate::detection::store::DetectionStore;
use crate::graph::analysis::NetworkAnalysis;
use crate::graph::budget::Deadline;
use crate::graph::path_search::validate_hop_range;
use crate::graph::transaction_graph::TransactionGraph;
use crate::risk::policy::Classification;
use serde::{Deserialize, Serialize};

/// A candidate detection that could not be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDetection {
    pub fraud_pattern: FraudPattern,
    pub affected_accounts: Vec<AccountId>,
    pub reason: String,
}

/// Outcome of one detection sweep.
///
/// Every candidate ends up in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub saved: Vec<CycleDetection>,
    pub failed: Vec<FailedDetection>,
}

impl DetectionBatch {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.saved.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs pattern queries against the graph store, classifies what they find
/// and persists the results.
///
/// Mutations of stored records are read-modify-write cycles against a
/// version-checked store. A conflicting concurrent write causes a fresh read
/// and another attempt, up to `max_update_retries` times.
pub struct CycleDetectionService<Q, S> {
    query: Q,
    store: S,
    config: EngineConfig,
}

impl<Q: GraphQuery, S: DetectionStore> CycleDetectionService<Q, S> {
    pub fn new(query: Q, store: S) -> Self {
        Self::with_config(query, store, EngineConfig::default())
    }

    pub fn with_config(query: Q, store: S, config: EngineConfig) -> Self {
        Self {
            query,
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn deadline(&self, engine: &'static str) -> Deadline {
        self.config.budget.deadline(engine)
    }

    fn build(
        &self,
        pattern: FraudPattern,
        description: String,
        cycle_length: usize,
        total_amount: f64,
        accounts: Vec<AccountId>,
    ) -> CycleDetection {
        let (severity, risk_score) =
            self.config
                .patterns
                .classify(pattern, &self.config.risk, cycle_length, total_amount);
        CycleDetection::new(
            pattern,
            description,
            cycle_length,
            total_amount,
            severity,
            risk_score,
        )
        .with_affected_accounts(accounts)
    }

    /// Insert a new record, drawing a fresh id if the generated one is taken.
    fn insert(&self, mut record: CycleDetection) -> Result<CycleDetection> {
        let attempts = self.config.detection.max_id_attempts.max(1);
        for attempt in 1..=attempts {
            match self.store.save(record.clone()) {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_conflict() && attempt < attempts => {
                    log::debug!("cycle id {} taken, regenerating", record.cycle_id());
                    record = record.with_cycle_id(CycleId::generate());
                }
                Err(e) => return Err(e),
            }
        }
        Err(DetectionError::invalid_input("max_id_attempts must be at least 1"))
    }

    fn persist_all(&self, candidates: Vec<CycleDetection>) -> DetectionBatch {
        let mut batch = DetectionBatch::default();
        for candidate in candidates {
            let pattern = candidate.fraud_pattern();
            let accounts = candidate.affected_accounts().to_vec();
            match self.insert(candidate) {
                Ok(saved) => batch.saved.push(saved),
                Err(e) => {
                    log::warn!("failed to persist {} detection: {}", pattern, e);
                    batch.failed.push(FailedDetection {
                        fraud_pattern: pattern,
                        affected_accounts: accounts,
                        reason: e.to_string(),
                    });
                }
            }
        }
        batch
    }

    // --- Detection sweeps ---

    /// Money that leaves an account and comes back within the configured hop range.
    pub fn detect_circular_money_flows(&self) -> Result<DetectionBatch> {
        let d = &self.config.detection;
        validate_hop_range(d.min_hops, d.max_hops)?;

        let rows = self
            .query
            .find_returning_paths(d.min_hops, d.max_hops, &self.deadline("returning-paths"))?;

        let candidates = rows
            .into_iter()
            .map(|row| {
                self.build(
                    FraudPattern::CircularMoneyFlow,
                    format!(
                        "Circular money flow: funds left {} and returned after {} hops",
                        row.origin_id, row.hop_count
                    ),
                    row.hop_count,
                    row.total_weight,
                    vec![row.origin_id],
                )
            })
            .collect();

        let batch = self.persist_all(candidates);
        log::info!(
            "circular money flows: {} saved, {} failed",
            batch.saved.len(),
            batch.failed.len()
        );
        Ok(batch)
    }

    /// Cards used at different locations within the configured window.
    pub fn detect_credit_card_fraud_loops(&self) -> Result<DetectionBatch> {
        let minutes = self.config.detection.card_window_minutes;
        if minutes <= 0 {
            return Err(DetectionError::invalid_input("card window must be positive"));
        }

        let rows = self.query.find_card_location_overlaps(
            chrono::Duration::minutes(minutes),
            &self.deadline("card-overlaps"),
        )?;

        let candidates = rows
            .into_iter()
            .map(|row| {
                self.build(
                    FraudPattern::CreditCardLoop,
                    format!(
                        "Impossible travel: card {} used at {} locations within {} minutes",
                        row.card_id, row.distinct_location_count, minutes
                    ),
                    row.distinct_location_count,
                    row.total_amount,
                    vec![AccountId::new(row.card_id)],
                )
            })
            .collect();

        let batch = self.persist_all(candidates);
        log::info!(
            "credit card loops: {} saved, {} failed",
            batch.saved.len(),
            batch.failed.len()
        );
        Ok(batch)
    }

    /// Identities shared by accounts that are also linked by relationships.
    pub fn detect_identity_theft_loops(&self) -> Result<DetectionBatch> {
        let max_hops = self.config.detection.identity_max_hops;
        validate_hop_range(1, max_hops)?;

        let rows = self
            .query
            .find_shared_identity_loops(max_hops, &self.deadline("identity-loops"))?;

        let candidates = rows
            .into_iter()
            .map(|row| {
                self.build(
                    FraudPattern::IdentityTheftLoop,
                    format!(
                        "Identity {} shared by {} related accounts",
                        row.identity_id, row.account_count
                    ),
                    row.account_count,
                    0.0,
                    row.account_ids,
                )
            })
            .collect();

        let batch = self.persist_all(candidates);
        log::info!(
            "identity theft loops: {} saved, {} failed",
            batch.saved.len(),
            batch.failed.len()
        );
        Ok(batch)
    }

    /// Any closed path over `relation_label`, classified by length alone.
    pub fn detect_all_cycles(&self, relation_label: &str) -> Result<DetectionBatch> {
        if relation_label.trim().is_empty() {
            return Err(DetectionError::invalid_input("relation label must not be empty"));
        }
        let d = &self.config.detection;
        validate_hop_range(d.min_hops, d.max_hops)?;

        let rows = self.query.find_closed_paths(
            relation_label,
            d.min_hops,
            d.max_hops,
            &self.deadline("closed-paths"),
        )?;

        let candidates = rows
            .into_iter()
            .map(|row| {
                let accounts = row.distinct_accounts();
                self.build(
                    FraudPattern::GenericCycle,
                    format!("Generic cycle in {} relationships", relation_label),
                    row.hop_count,
                    0.0,
                    accounts,
                )
            })
            .collect();

        let batch = self.persist_all(candidates);
        log::info!(
            "generic cycles over {}: {} saved, {} failed",
            relation_label,
            batch.saved.len(),
            batch.failed.len()
        );
        Ok(batch)
    }

    // --- Record mutations ---

    fn update_with<F>(&self, id: &CycleId, mut mutate: F) -> Result<CycleDetection>
    where
        F: FnMut(&mut CycleDetection) -> Result<()>,
    {
        let mut retries = 0;
        loop {
            let mut record = self
                .store
                .find_by_id(id)?
                .ok_or_else(|| DetectionError::NotFound(id.to_string()))?;
            mutate(&mut record)?;

            match self.store.save(record) {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_conflict() && retries < self.config.detection.max_update_retries => {
                    retries += 1;
                    log::warn!("{}; retrying from a fresh read ({})", e, retries);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Recompute severity and risk score from the record's current length and
    /// amount.
    ///
    /// Scoring always uses the derived classifier, including for patterns
    /// whose detection assigned fixed scores.
    pub fn analyze_cycle(&self, id: &CycleId) -> Result<CycleDetection> {
        let risk = &self.config.risk;
        let updated = self.update_with(id, |record| {
            let (severity, score) =
                Classification::Derived.classify(risk, record.cycle_length(), record.total_amount());
            record.reclassify(severity, score);
            Ok(())
        })?;
        log::debug!(
            "analyzed {}: {} / {:.3}",
            id,
            updated.severity(),
            updated.risk_score()
        );
        Ok(updated)
    }

    /// Move a record through the investigation workflow.
    pub fn update_cycle_status(&self, id: &CycleId, status: CycleStatus) -> Result<CycleDetection> {
        let updated = self.update_with(id, |record| {
            record
                .set_status(status)
                .map(|_| ())
                .map_err(|from| DetectionError::InvalidTransition { from, to: status })
        })?;
        log::info!("cycle {} is now {}", id, status);
        Ok(updated)
    }

    /// Attach a fraud type, detection method or indicator label.
    pub fn tag_cycle(&self, id: &CycleId, kind: TagKind, name: &str) -> Result<CycleDetection> {
        if name.trim().is_empty() {
            return Err(DetectionError::invalid_input("tag name must not be empty"));
        }
        self.update_with(id, |record| {
            record.add_tag(kind, name);
            Ok(())
        })
    }

    // --- Reads ---

    pub fn cycle_by_id(&self, id: &CycleId) -> Result<Option<CycleDetection>> {
        self.store.find_by_id(id)
    }

    pub fn all_cycles(&self) -> Result<Vec<CycleDetection>> {
        self.store.find_all()
    }

    pub fn cycles_by_pattern(&self, pattern: FraudPattern) -> Result<Vec<CycleDetection>> {
        self.store.find_by_pattern(pattern)
    }

    pub fn cycles_by_status(&self, status: CycleStatus) -> Result<Vec<CycleDetection>> {
        self.store.find_by_status(status)
    }

    pub fn high_risk_cycles(&self) -> Result<Vec<CycleDetection>> {
        self.store.find_high_risk(&self.config.risk)
    }

    pub fn medium_risk_cycles(&self) -> Result<Vec<CycleDetection>> {
        self.store.find_medium_risk(&self.config.risk)
    }

    pub fn recent_cycles(&self, hours: u32) -> Result<Vec<CycleDetection>> {
        self.store.find_recent(hours)
    }

    pub fn confirmed_cycles(&self) -> Result<Vec<CycleDetection>> {
        self.store.find_confirmed()
    }

    pub fn generate_fraud_detection_report(&self) -> Result<FraudDetectionReport> {
        let all = self.store.find_all()?;
        Ok(FraudDetectionReport::from_detections(&all, &self.config.risk))
    }

    /// Run every engine over an ad-hoc graph under the configured budget.
    pub fn analyze_network(
        &self,
        graph: &TransactionGraph,
        source: Option<&AccountId>,
    ) -> Result<NetworkAnalysis> {
        NetworkAnalysis::run(
            graph,
            source,
            &self.config.budget,
            self.config.detection.top_suspects,
        )
    }
}
