//! Shared types and models for the Site Kardex platform
//!
//! This crate holds the ledger's domain types and the pure bookkeeping rules
//! (weighted-average costing, requisition status derivation, alert states)
//! used by the backend engine and by its tests.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
