//! HTTP request handlers

pub mod assets;
pub mod health;
pub mod movements;
pub mod requisitions;
pub mod stock;

pub use assets::*;
pub use health::*;
pub use movements::*;
pub use requisitions::*;
pub use stock::*;
