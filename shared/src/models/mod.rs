//! Domain models for the Site Kardex ledger

mod asset;
mod catalog;
mod movement;
mod ppe;
mod project;
mod requisition;
mod stock;

pub use asset::*;
pub use catalog::*;
pub use movement::*;
pub use ppe::*;
pub use project::*;
pub use requisition::*;
pub use stock::*;
