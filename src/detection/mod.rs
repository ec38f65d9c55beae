//! Pattern detection, persistence and reporting of fraud cycles.
//!
//! [`service::CycleDetectionService`] ties a [`query::GraphQuery`] to a
//! [`store::DetectionStore`]; [`network`] and [`store`] carry the in-memory
//! implementations of both.

pub mod network;
pub mod query;
pub mod record;
pub mod report;
pub mod service;
pub mod store;
pub mod workflow;
