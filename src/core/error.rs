//! Error types shared by the engines and the detection service.

use crate::detection::record::CycleStatus;
use thiserror::Error;

/// Result type alias using `DetectionError`.
pub type Result<T> = std::result::Result<T, DetectionError>;

/// Errors that can occur while detecting, classifying or persisting cycles.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// No detection record exists under the given cycle id.
    #[error("cycle detection not found: {0}")]
    NotFound(String),

    /// Malformed request or graph input (bad hop bounds, empty label,
    /// references to accounts that are not part of the graph).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The graph store or the persistence sink failed.
    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    /// An engine exceeded its node/edge/time budget or was cancelled.
    #[error("{engine} exceeded its computation budget: {reason}")]
    ComputationOverrun { engine: &'static str, reason: String },

    /// Status change not permitted by the workflow.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: CycleStatus, to: CycleStatus },

    /// Optimistic-concurrency check failed on save.
    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: String,
        expected: u64,
        found: u64,
    },
}

impl DetectionError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn overrun(engine: &'static str, reason: impl Into<String>) -> Self {
        Self::ComputationOverrun {
            engine,
            reason: reason.into(),
        }
    }

    pub fn unavailable(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            collaborator,
            reason: reason.into(),
        }
    }

    /// True for failures worth retrying on a fresh read.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DetectionError::overrun("floyd-warshall", "600 nodes > 500");
        assert_eq!(
            err.to_string(),
            "floyd-warshall exceeded its computation budget: 600 nodes > 500"
        );

        let err = DetectionError::InvalidTransition {
            from: CycleStatus::Resolved,
            to: CycleStatus::Detected,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition from RESOLVED to DETECTED"
        );
    }

    #[test]
    fn test_conflict_classification() {
        let conflict = DetectionError::VersionConflict {
            id: "CYCLE_1_1".into(),
            expected: 1,
            found: 2,
        };
        assert!(conflict.is_conflict());
        assert!(!DetectionError::NotFound("x".into()).is_conflict());
    }
}
