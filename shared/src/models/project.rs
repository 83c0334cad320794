//! Project registry and warehouse models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A construction project (cost owner of every existence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    /// Internal code (e.g., "LT-500")
    pub code: String,
    pub name: String,
    /// When set, inbound lines require a unit cost and the weighted average is maintained
    pub uses_cost_control: bool,
    pub is_active: bool,
}

/// A physical store belonging to exactly one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Unique within the project
    pub code: String,
    pub name: String,
    pub is_primary: bool,
    pub location: Option<String>,
}

impl std::fmt::Display for Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
