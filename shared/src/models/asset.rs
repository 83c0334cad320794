//! Fixed-asset registry models
//!
//! Assets are serialized pieces of equipment created by purchase entries.
//! Their state and current holder move with outbound and inbound movements,
//! and every change of holder is kept as an append-only assignment row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseEnumError;

/// A serialized fixed asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: Uuid,
    /// Internal code, `{material code}-{serial}`
    pub code: String,
    pub material_id: Uuid,
    /// Manufacturer serial, globally unique
    pub serial: String,
    pub state: AssetState,
    /// Warehouse where the asset physically sits
    pub location_id: Option<Uuid>,
    pub current_holder_id: Option<Uuid>,
    /// Purchase movement that created the asset
    pub origin_movement_id: Option<Uuid>,
    pub kit_id: Option<Uuid>,
}

/// Asset lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Available,
    Assigned,
    Maintenance,
    Retired,
    /// Sent back to the head office
    ReturnedExternal,
}

impl AssetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetState::Available => "available",
            AssetState::Assigned => "assigned",
            AssetState::Maintenance => "maintenance",
            AssetState::Retired => "retired",
            AssetState::ReturnedExternal => "returned_external",
        }
    }
}

impl std::fmt::Display for AssetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssetState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(AssetState::Available),
            "assigned" => Ok(AssetState::Assigned),
            "maintenance" => Ok(AssetState::Maintenance),
            "retired" => Ok(AssetState::Retired),
            "returned_external" => Ok(AssetState::ReturnedExternal),
            other => Err(ParseEnumError::new("asset state", other)),
        }
    }
}

/// State, location and holder of an asset at a point in time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetSnapshot {
    pub state: AssetState,
    pub location_id: Option<Uuid>,
    pub holder_id: Option<Uuid>,
}

impl Asset {
    pub fn snapshot(&self) -> AssetSnapshot {
        AssetSnapshot {
            state: self.state,
            location_id: self.location_id,
            holder_id: self.current_holder_id,
        }
    }

    pub fn restore(&mut self, snapshot: AssetSnapshot) {
        self.state = snapshot.state;
        self.location_id = snapshot.location_id;
        self.current_holder_id = snapshot.holder_id;
    }

    pub fn is_available(&self) -> bool {
        self.state == AssetState::Available
    }

    /// Put the asset back on a shelf with nobody holding it
    pub fn shelve(&mut self, warehouse_id: Option<Uuid>) {
        self.state = AssetState::Available;
        self.location_id = warehouse_id;
        self.current_holder_id = None;
    }
}

/// One period during which a worker held an asset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetAssignment {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub worker_id: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: String,
    /// Movement that opened this assignment, if any
    pub movement_id: Option<Uuid>,
    /// Movement that closed this assignment, if any
    pub closed_by_movement_id: Option<Uuid>,
}

impl AssetAssignment {
    pub fn open(
        asset_id: Uuid,
        worker_id: Uuid,
        assigned_at: DateTime<Utc>,
        notes: impl Into<String>,
        movement_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset_id,
            worker_id,
            assigned_at,
            returned_at: None,
            notes: notes.into(),
            movement_id,
            closed_by_movement_id: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn close(&mut self, returned_at: DateTime<Utc>, movement_id: Option<Uuid>) {
        self.returned_at = Some(returned_at);
        self.closed_by_movement_id = movement_id;
    }

    pub fn reopen(&mut self) {
        self.returned_at = None;
        self.closed_by_movement_id = None;
    }
}

/// A named group of assets handed out together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kit {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// Internal asset code for a purchased serial
pub fn asset_code(material_code: &str, serial: &str) -> String {
    format!("{}-{}", material_code, serial)
}
