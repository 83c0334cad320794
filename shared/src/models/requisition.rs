//! Requisition models
//!
//! A requisition is a formal request for materials from a site. Each line
//! tracks three counters: what was requested, what has been received into a
//! warehouse against it, and what has been handed over to the requester.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseEnumError;

/// A material request from a project site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requisition {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Sequential code (e.g., "REQ-00001")
    pub code: String,
    pub requester: String,
    pub requested_on: NaiveDate,
    pub needed_by: Option<NaiveDate>,
    pub priority: RequisitionPriority,
    pub status: RequisitionStatus,
    /// Closed by hand; the status no longer follows the counters
    #[serde(default)]
    pub closed_manually: bool,
    pub notes: String,
    pub lines: Vec<RequisitionLine>,
}

/// One requested material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequisitionLine {
    pub id: Uuid,
    pub requisition_id: Uuid,
    pub material_id: Uuid,
    pub requested_qty: Decimal,
    /// Delivered to a warehouse against this line
    pub received_qty: Decimal,
    /// Handed over to the requester
    pub fulfilled_qty: Decimal,
}

/// Requisition status, derived from line counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionStatus {
    Pending,
    Partial,
    Fulfilled,
    Cancelled,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequisitionStatus::Pending => "pending",
            RequisitionStatus::Partial => "partial",
            RequisitionStatus::Fulfilled => "fulfilled",
            RequisitionStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for RequisitionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequisitionStatus::Pending),
            "partial" => Ok(RequisitionStatus::Partial),
            "fulfilled" => Ok(RequisitionStatus::Fulfilled),
            "cancelled" => Ok(RequisitionStatus::Cancelled),
            other => Err(ParseEnumError::new("requisition status", other)),
        }
    }
}

/// Urgency declared by the requester
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequisitionPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl RequisitionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequisitionPriority::Low => "low",
            RequisitionPriority::Medium => "medium",
            RequisitionPriority::High => "high",
            RequisitionPriority::Urgent => "urgent",
        }
    }
}

impl std::str::FromStr for RequisitionPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RequisitionPriority::Low),
            "medium" => Ok(RequisitionPriority::Medium),
            "high" => Ok(RequisitionPriority::High),
            "urgent" => Ok(RequisitionPriority::Urgent),
            other => Err(ParseEnumError::new("requisition priority", other)),
        }
    }
}

impl RequisitionLine {
    /// Still owed to the requester
    pub fn pending_qty(&self) -> Decimal {
        (self.requested_qty - self.fulfilled_qty).max(Decimal::ZERO)
    }

    /// Received but not yet handed over; this is the reserved quantity
    pub fn undelivered_qty(&self) -> Decimal {
        (self.received_qty - self.fulfilled_qty).max(Decimal::ZERO)
    }

    /// Still expected from suppliers
    pub fn outstanding_receipt_qty(&self) -> Decimal {
        self.requested_qty - self.received_qty
    }
}

impl Requisition {
    /// Pending and partial requisitions take part in reconciliation
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            RequisitionStatus::Pending | RequisitionStatus::Partial
        )
    }

    pub fn line_for(&self, material_id: Uuid) -> Option<&RequisitionLine> {
        self.lines.iter().find(|l| l.material_id == material_id)
    }

    pub fn line_for_mut(&mut self, material_id: Uuid) -> Option<&mut RequisitionLine> {
        self.lines.iter_mut().find(|l| l.material_id == material_id)
    }

    /// Status after a handover: partial while any line is still owed
    pub fn refresh_status_after_fulfillment(&mut self) {
        self.status = if self.lines.iter().any(|l| l.pending_qty() > Decimal::ZERO) {
            RequisitionStatus::Partial
        } else {
            RequisitionStatus::Fulfilled
        };
    }

    /// Status after a handover was undone.
    ///
    /// Cancelled and manually closed requisitions keep their status.
    pub fn refresh_status_after_reversal(&mut self) {
        if self.closed_manually || self.status == RequisitionStatus::Cancelled {
            return;
        }

        let any_fulfilled = self.lines.iter().any(|l| l.fulfilled_qty > Decimal::ZERO);
        let any_pending = self.lines.iter().any(|l| l.pending_qty() > Decimal::ZERO);

        self.status = if !any_fulfilled {
            RequisitionStatus::Pending
        } else if any_pending {
            RequisitionStatus::Partial
        } else {
            RequisitionStatus::Fulfilled
        };
    }

    /// Close by hand; remaining undelivered stock stops being reserved
    pub fn close_manually(&mut self) {
        self.status = RequisitionStatus::Fulfilled;
        self.closed_manually = true;
    }

    /// Fulfilled over requested across all lines, as a percentage capped at 100
    pub fn fulfillment_percentage(&self) -> Decimal {
        let requested: Decimal = self.lines.iter().map(|l| l.requested_qty).sum();
        if requested <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let fulfilled: Decimal = self
            .lines
            .iter()
            .map(|l| l.fulfilled_qty.min(l.requested_qty))
            .sum();
        (fulfilled / requested * Decimal::from(100)).min(Decimal::from(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requisition(lines: &[(i64, i64, i64)]) -> Requisition {
        let id = Uuid::new_v4();
        Requisition {
            id,
            project_id: Uuid::new_v4(),
            code: "REQ-00001".to_string(),
            requester: "Resident engineer".to_string(),
            requested_on: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            needed_by: None,
            priority: RequisitionPriority::Medium,
            status: RequisitionStatus::Pending,
            closed_manually: false,
            notes: String::new(),
            lines: lines
                .iter()
                .map(|(req, rec, ful)| RequisitionLine {
                    id: Uuid::new_v4(),
                    requisition_id: id,
                    material_id: Uuid::new_v4(),
                    requested_qty: Decimal::from(*req),
                    received_qty: Decimal::from(*rec),
                    fulfilled_qty: Decimal::from(*ful),
                })
                .collect(),
        }
    }

    #[test]
    fn test_line_quantities() {
        let req = requisition(&[(100, 80, 30)]);
        let line = &req.lines[0];
        assert_eq!(line.pending_qty(), Decimal::from(70));
        assert_eq!(line.undelivered_qty(), Decimal::from(50));
        assert_eq!(line.outstanding_receipt_qty(), Decimal::from(20));
    }

    #[test]
    fn test_pending_never_negative() {
        let req = requisition(&[(10, 12, 12)]);
        assert_eq!(req.lines[0].pending_qty(), Decimal::ZERO);
    }

    #[test]
    fn test_status_after_fulfillment() {
        let mut req = requisition(&[(50, 50, 50), (10, 10, 5)]);
        req.refresh_status_after_fulfillment();
        assert_eq!(req.status, RequisitionStatus::Partial);

        req.lines[1].fulfilled_qty = Decimal::from(10);
        req.refresh_status_after_fulfillment();
        assert_eq!(req.status, RequisitionStatus::Fulfilled);
    }

    #[test]
    fn test_status_after_reversal() {
        let mut req = requisition(&[(50, 50, 0)]);
        req.status = RequisitionStatus::Fulfilled;
        req.refresh_status_after_reversal();
        assert_eq!(req.status, RequisitionStatus::Pending);

        let mut req = requisition(&[(50, 50, 20)]);
        req.refresh_status_after_reversal();
        assert_eq!(req.status, RequisitionStatus::Partial);
    }

    #[test]
    fn test_reversal_keeps_closed_and_cancelled_status() {
        let mut closed = requisition(&[(50, 30, 0)]);
        closed.close_manually();
        closed.refresh_status_after_reversal();
        assert_eq!(closed.status, RequisitionStatus::Fulfilled);

        let mut cancelled = requisition(&[(50, 30, 0)]);
        cancelled.status = RequisitionStatus::Cancelled;
        cancelled.refresh_status_after_reversal();
        assert_eq!(cancelled.status, RequisitionStatus::Cancelled);
    }

    #[test]
    fn test_fulfillment_percentage() {
        let req = requisition(&[(50, 50, 25), (50, 0, 0)]);
        assert_eq!(req.fulfillment_percentage(), Decimal::from(25));

        let empty = requisition(&[]);
        assert_eq!(empty.fulfillment_percentage(), Decimal::ZERO);
    }
}
