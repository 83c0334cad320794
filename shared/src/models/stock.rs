//! Stock and valuation models
//!
//! `Stock` is the physical quantity of a material in one warehouse.
//! `Existence` is the project-wide card for the same material: the aggregate
//! quantity across all warehouses of the project plus its weighted-average cost.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Physical stock of a material in a warehouse
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    pub warehouse_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    /// Reorder point
    pub minimum_quantity: Decimal,
    /// Shelf reference (e.g., "Rack A1")
    pub aisle_location: Option<String>,
}

impl Stock {
    pub fn new(warehouse_id: Uuid, material_id: Uuid) -> Self {
        Self {
            warehouse_id,
            material_id,
            quantity: Decimal::ZERO,
            minimum_quantity: Decimal::ZERO,
            aisle_location: None,
        }
    }

    /// Traffic-light state against the reorder point
    pub fn alert_state(&self) -> AlertState {
        if self.minimum_quantity > Decimal::ZERO {
            if self.quantity <= self.minimum_quantity {
                return AlertState::Critical;
            }
            if self.quantity <= self.minimum_quantity * Decimal::new(12, 1) {
                return AlertState::Warning;
            }
        }
        AlertState::Ok
    }
}

/// Stock alert level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// At or below the reorder point
    Critical,
    /// Within 20% above the reorder point
    Warning,
    Ok,
}

/// Project-wide quantity and weighted-average cost of a material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Existence {
    pub project_id: Uuid,
    pub material_id: Uuid,
    pub average_cost: Decimal,
    pub last_purchase_cost: Decimal,
    pub total_project_quantity: Decimal,
}

impl Existence {
    pub fn new(project_id: Uuid, material_id: Uuid) -> Self {
        Self {
            project_id,
            material_id,
            average_cost: Decimal::ZERO,
            last_purchase_cost: Decimal::ZERO,
            total_project_quantity: Decimal::ZERO,
        }
    }

    /// Valuation of the project-wide quantity at the current average cost
    pub fn total_value(&self) -> Decimal {
        self.total_project_quantity * self.average_cost
    }

    /// Adds received quantity.
    ///
    /// With a unit cost (cost control on) the average becomes
    /// `(qty_before * avg + qty * cost) / (qty_before + qty)` and the cost is
    /// remembered as the last purchase cost.
    pub fn receive(&mut self, quantity: Decimal, unit_cost: Option<Decimal>) {
        let new_total = self.total_project_quantity + quantity;

        if let Some(cost) = unit_cost {
            if new_total > Decimal::ZERO {
                self.average_cost = (self.total_value() + quantity * cost) / new_total;
            }
            self.last_purchase_cost = cost;
        }

        self.total_project_quantity = new_total;
    }

    /// Removes issued quantity; the average cost is unchanged on outbound
    pub fn issue(&mut self, quantity: Decimal) {
        self.total_project_quantity -= quantity;
    }

    /// Backs a previously received quantity out of the card.
    ///
    /// The remaining value is clamped at zero and the average resets to zero
    /// when nothing is left.
    pub fn unreceive(&mut self, quantity: Decimal, unit_cost: Option<Decimal>) {
        let new_total = self.total_project_quantity - quantity;

        if let Some(cost) = unit_cost {
            let remaining_value = (self.total_value() - quantity * cost).max(Decimal::ZERO);
            self.average_cost = if new_total > Decimal::ZERO {
                remaining_value / new_total
            } else {
                Decimal::ZERO
            };
        }

        self.total_project_quantity = new_total;
    }

    /// Puts a previously issued quantity back on the card
    pub fn unissue(&mut self, quantity: Decimal) {
        self.total_project_quantity += quantity;
    }
}
