//! Severity and risk scoring for detected cycles.

pub mod classifier;
pub mod policy;
