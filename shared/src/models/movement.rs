//! Movement (kardex voucher) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AssetSnapshot;
use crate::types::ParseEnumError;

/// A movement header with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub project_id: Uuid,
    pub movement_type: MovementType,
    pub status: MovementStatus,
    pub moved_at: DateTime<Utc>,
    /// Supplier guide, invoice or voucher number
    pub reference_document: String,
    /// Internal entry note for purchases (e.g., "NI-00001")
    pub entry_note: Option<String>,
    /// Requisition that justifies the whole movement
    pub requisition_id: Option<Uuid>,
    pub source_warehouse_id: Option<Uuid>,
    pub destination_warehouse_id: Option<Uuid>,
    /// Cost center for site consumption
    pub tower_id: Option<Uuid>,
    /// Requester or beneficiary
    pub worker_id: Option<Uuid>,
    pub notes: String,
    pub lines: Vec<MovementLine>,
}

/// One material on a movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementLine {
    pub id: Uuid,
    pub movement_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    /// Purchase cost for inbound lines, average-cost snapshot for outbound lines
    pub unit_cost: Decimal,
    /// Comma-separated serials for fixed-asset purchases
    pub serials: Option<String>,
    /// Specific asset handed out or brought back
    pub asset_id: Option<Uuid>,
    /// Overrides the header requisition for this line
    pub requisition_id: Option<Uuid>,
    /// Requisition actually reconciled at confirm time (explicit or FIFO)
    pub resolved_requisition_id: Option<Uuid>,
    /// Skips FIFO matching on inbound
    pub is_free_stock: bool,
    /// State of the linked asset before an inbound line moved it
    pub prior_asset: Option<AssetSnapshot>,
}

/// Closed set of movement types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    PurchaseIn,
    /// Consumption at a tower (cost center)
    SiteOut,
    PpeOut,
    OfficeOut,
    TransferOut,
    TransferIn,
    SiteReturnIn,
    /// Return to the head office
    CentralReturnOut,
    /// Re-entry from the head office
    CentralReentryIn,
    InventoryAdjustment,
}

/// Stock effect of a movement type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectGroup {
    Inbound,
    Outbound,
    /// Direction decided by which warehouse the header names
    Adjustment,
}

/// Resolved direction of a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl MovementType {
    pub const fn effect_group(self) -> EffectGroup {
        match self {
            MovementType::PurchaseIn
            | MovementType::TransferIn
            | MovementType::SiteReturnIn
            | MovementType::CentralReentryIn => EffectGroup::Inbound,
            MovementType::SiteOut
            | MovementType::PpeOut
            | MovementType::OfficeOut
            | MovementType::TransferOut
            | MovementType::CentralReturnOut => EffectGroup::Outbound,
            MovementType::InventoryAdjustment => EffectGroup::Adjustment,
        }
    }

    /// Types that hand material to a named worker
    pub const fn requires_worker(self) -> bool {
        matches!(
            self,
            MovementType::SiteOut | MovementType::PpeOut | MovementType::OfficeOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::PurchaseIn => "purchase_in",
            MovementType::SiteOut => "site_out",
            MovementType::PpeOut => "ppe_out",
            MovementType::OfficeOut => "office_out",
            MovementType::TransferOut => "transfer_out",
            MovementType::TransferIn => "transfer_in",
            MovementType::SiteReturnIn => "site_return_in",
            MovementType::CentralReturnOut => "central_return_out",
            MovementType::CentralReentryIn => "central_reentry_in",
            MovementType::InventoryAdjustment => "inventory_adjustment",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementType::PurchaseIn => write!(f, "Purchase entry"),
            MovementType::SiteOut => write!(f, "Site consumption"),
            MovementType::PpeOut => write!(f, "PPE delivery"),
            MovementType::OfficeOut => write!(f, "Office issue"),
            MovementType::TransferOut => write!(f, "Transfer (out)"),
            MovementType::TransferIn => write!(f, "Transfer (in)"),
            MovementType::SiteReturnIn => write!(f, "Site return"),
            MovementType::CentralReturnOut => write!(f, "Return to head office"),
            MovementType::CentralReentryIn => write!(f, "Re-entry from head office"),
            MovementType::InventoryAdjustment => write!(f, "Inventory adjustment"),
        }
    }
}

impl std::str::FromStr for MovementType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase_in" => Ok(MovementType::PurchaseIn),
            "site_out" => Ok(MovementType::SiteOut),
            "ppe_out" => Ok(MovementType::PpeOut),
            "office_out" => Ok(MovementType::OfficeOut),
            "transfer_out" => Ok(MovementType::TransferOut),
            "transfer_in" => Ok(MovementType::TransferIn),
            "site_return_in" => Ok(MovementType::SiteReturnIn),
            "central_return_out" => Ok(MovementType::CentralReturnOut),
            "central_reentry_in" => Ok(MovementType::CentralReentryIn),
            "inventory_adjustment" => Ok(MovementType::InventoryAdjustment),
            other => Err(ParseEnumError::new("movement type", other)),
        }
    }
}

/// Movement lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::Draft => "draft",
            MovementStatus::Confirmed => "confirmed",
            MovementStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for MovementStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(MovementStatus::Draft),
            "confirmed" => Ok(MovementStatus::Confirmed),
            "cancelled" => Ok(MovementStatus::Cancelled),
            other => Err(ParseEnumError::new("movement status", other)),
        }
    }
}

impl Movement {
    /// Stock direction; adjustments go inbound when a destination is set
    pub fn direction(&self) -> Option<Direction> {
        match self.movement_type.effect_group() {
            EffectGroup::Inbound => Some(Direction::Inbound),
            EffectGroup::Outbound => Some(Direction::Outbound),
            EffectGroup::Adjustment => {
                if self.destination_warehouse_id.is_some() {
                    Some(Direction::Inbound)
                } else if self.source_warehouse_id.is_some() {
                    Some(Direction::Outbound)
                } else {
                    None
                }
            }
        }
    }

    /// Warehouse whose stock this movement changes
    pub fn stock_warehouse_id(&self) -> Option<Uuid> {
        match self.direction()? {
            Direction::Inbound => self.destination_warehouse_id,
            Direction::Outbound => self.source_warehouse_id,
        }
    }

    /// Explicit requisition link of a line: line override, else header
    pub fn linked_requisition(&self, line: &MovementLine) -> Option<Uuid> {
        line.requisition_id.or(self.requisition_id)
    }

    /// Distinct materials in ascending id order (lock order)
    pub fn material_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.lines.iter().map(|l| l.material_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Requisitions the lines are explicitly linked to, ascending and distinct
    pub fn linked_requisition_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .lines
            .iter()
            .filter_map(|l| self.linked_requisition(l))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Requisitions recorded against the lines at confirm, ascending and distinct
    pub fn resolved_requisition_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .lines
            .iter()
            .filter_map(|l| l.resolved_requisition_id)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Short display code
    pub fn visual_code(&self) -> String {
        let id = self.id.simple().to_string();
        format!("MOV-{}", id[..8].to_uppercase())
    }
}

/// Generate an entry note for purchase movements
pub fn generate_entry_note(sequence: i64) -> String {
    format!("NI-{:05}", sequence)
}
