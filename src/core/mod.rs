//! Foundational types: account identifiers, transaction edges, errors.

pub mod account;
pub mod error;
pub mod transaction;
