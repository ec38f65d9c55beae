use crate::detection::network::{MONEY_FLOW_LABELS, RELATIONSHIP_LABEL};
use crate::graph::budget::ComputeBudget;
use crate::risk::classifier::RiskPolicy;
use crate::risk::policy::PatternPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub risk: RiskPolicy,
    pub patterns: PatternPolicy,
    pub budget: ComputeBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Shortest money-flow or generic cycle searched for, in hops.
    pub min_hops: usize,
    /// Longest money-flow or generic cycle searched for, in hops.
    pub max_hops: usize,
    /// Longest relationship path linking accounts that share an identity.
    pub identity_max_hops: usize,
    /// Card uses at different locations closer than this are flagged.
    pub card_window_minutes: i64,
    pub money_flow_labels: Vec<String>,
    pub identity_relation_label: String,
    /// Fresh-read retries after a version conflict.
    pub max_update_retries: usize,
    /// Id regenerations after a collision on insert.
    pub max_id_attempts: usize,
    /// Accounts listed in suspect rankings.
    pub top_suspects: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_hops: 2,
            max_hops: 10,
            identity_max_hops: 5,
            card_window_minutes: 60,
            money_flow_labels: MONEY_FLOW_LABELS.iter().map(|s| s.to_string()).collect(),
            identity_relation_label: RELATIONSHIP_LABEL.into(),
            max_update_retries: 3,
            max_id_attempts: 5,
            top_suspects: 10,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&contents)?;
        log::info!("config loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        if d.min_hops == 0 || d.min_hops > d.max_hops {
            return Err(ConfigError::Invalid(format!(
                "hop range {}..={} is empty or starts at zero",
                d.min_hops, d.max_hops
            )));
        }
        if d.identity_max_hops == 0 {
            return Err(ConfigError::Invalid("identity_max_hops must be at least 1".into()));
        }
        if d.card_window_minutes <= 0 {
            return Err(ConfigError::Invalid("card_window_minutes must be positive".into()));
        }
        if d.money_flow_labels.is_empty() || d.money_flow_labels.iter().any(|l| l.trim().is_empty()) {
            return Err(ConfigError::Invalid("money_flow_labels must be non-empty".into()));
        }
        if d.identity_relation_label.trim().is_empty() {
            return Err(ConfigError::Invalid("identity_relation_label must be non-empty".into()));
        }
        if d.max_id_attempts == 0 {
            return Err(ConfigError::Invalid("max_id_attempts must be at least 1".into()));
        }

        let r = &self.risk;
        if r.length_saturation <= 0.0 || r.amount_saturation <= 0.0 {
            return Err(ConfigError::Invalid("saturation points must be positive".into()));
        }
        if r.length_weight < 0.0 || r.amount_weight < 0.0 || r.length_weight + r.amount_weight > 1.0 + 1e-9 {
            return Err(ConfigError::Invalid(
                "risk weights must be non-negative and sum to at most 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&r.medium_risk_score)
            || !(0.0..=1.0).contains(&r.high_risk_score)
            || r.medium_risk_score > r.high_risk_score
        {
            return Err(ConfigError::Invalid(
                "risk bucket thresholds must satisfy 0 <= medium <= high <= 1".into(),
            ));
        }
        Ok(())
    }
}
