//! Catalog models: materials and the workers who receive them

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseEnumError;

/// A global catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: Uuid,
    /// Globally unique code (e.g., "MAT-001")
    pub code: String,
    pub description: String,
    /// Unit of measure (UND, M, KG, BLS)
    pub unit_of_measure: String,
    pub kind: MaterialKind,
    pub is_active: bool,
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.code, self.description)
    }
}

/// How a material is consumed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    /// Used up on site (cement, bolts)
    Consumable,
    /// Serialized, returnable equipment (drills, generators)
    FixedAsset,
    /// Personal protective equipment handed to a worker
    Ppe,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Consumable => "consumable",
            MaterialKind::FixedAsset => "fixed_asset",
            MaterialKind::Ppe => "ppe",
        }
    }
}

impl std::str::FromStr for MaterialKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consumable" => Ok(MaterialKind::Consumable),
            "fixed_asset" => Ok(MaterialKind::FixedAsset),
            "ppe" => Ok(MaterialKind::Ppe),
            other => Err(ParseEnumError::new("material kind", other)),
        }
    }
}

/// Site personnel that can hold assets or receive PPE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    /// National identity document
    pub dni: String,
    pub first_names: String,
    pub last_names: String,
    pub position: Option<String>,
    pub is_active: bool,
}

impl Worker {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_names, self.last_names)
    }
}
