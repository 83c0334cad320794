//! Requisition service: fulfillment progress and manual closure

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{Requisition, RequisitionLine, RequisitionStatus};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repositories::{LedgerStore, LedgerTx};
use crate::services::finish;

/// Service for requisition bookkeeping outside of movements
#[derive(Clone)]
pub struct RequisitionService {
    store: Arc<dyn LedgerStore>,
}

/// Counters of one requisition line
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineProgress {
    pub material_id: Uuid,
    pub requested_qty: Decimal,
    pub received_qty: Decimal,
    pub fulfilled_qty: Decimal,
    pub pending_qty: Decimal,
    pub undelivered_qty: Decimal,
}

impl From<&RequisitionLine> for LineProgress {
    fn from(line: &RequisitionLine) -> Self {
        Self {
            material_id: line.material_id,
            requested_qty: line.requested_qty,
            received_qty: line.received_qty,
            fulfilled_qty: line.fulfilled_qty,
            pending_qty: line.pending_qty(),
            undelivered_qty: line.undelivered_qty(),
        }
    }
}

/// Fulfillment view of a requisition
#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentReport {
    pub requisition_id: Uuid,
    pub code: String,
    pub status: RequisitionStatus,
    /// Fulfilled over requested, capped at 100
    pub percentage: Decimal,
    pub lines: Vec<LineProgress>,
}

/// Outcome of closing a requisition by hand
#[derive(Debug, Clone, Serialize)]
pub struct ClosureReport {
    pub requisition_id: Uuid,
    pub code: String,
    pub status: RequisitionStatus,
    /// Lines whose received but undelivered quantity became free stock
    pub released: Vec<LineProgress>,
}

impl RequisitionService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Per-line progress and overall percentage
    pub async fn fulfillment(&self, requisition_id: Uuid) -> AppResult<FulfillmentReport> {
        let mut tx = self.store.begin().await?;
        let result = tx.find_requisition(requisition_id).await;
        let requisition = finish(tx, result)
            .await?
            .ok_or_else(|| AppError::NotFound("Requisition".to_string()))?;

        Ok(FulfillmentReport {
            requisition_id: requisition.id,
            code: requisition.code.clone(),
            status: requisition.status,
            percentage: requisition.fulfillment_percentage(),
            lines: requisition.lines.iter().map(LineProgress::from).collect(),
        })
    }

    /// Mark an open requisition as fulfilled, releasing its reservations
    pub async fn close(&self, requisition_id: Uuid) -> AppResult<ClosureReport> {
        let mut tx = self.store.begin().await?;
        let result = Self::close_in(&mut *tx, requisition_id).await;
        let report = finish(tx, result).await?;

        if !report.released.is_empty() {
            let released: Decimal = report.released.iter().map(|l| l.undelivered_qty).sum();
            tracing::warn!(
                requisition = %report.code,
                lines = report.released.len(),
                quantity = %released,
                "Requisition closed with undelivered stock; released as free stock"
            );
        } else {
            tracing::info!(requisition = %report.code, "Requisition closed");
        }

        Ok(report)
    }

    async fn close_in(tx: &mut dyn LedgerTx, requisition_id: Uuid) -> AppResult<ClosureReport> {
        let mut requisition: Requisition = tx
            .lock_requisition(requisition_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Requisition".to_string()))?;

        if !requisition.is_open() {
            return Err(AppError::InvalidState(format!(
                "only pending or partial requisitions can be closed; {} is {}",
                requisition.code,
                requisition.status.as_str()
            )));
        }

        requisition.close_manually();
        tx.save_requisition(&requisition).await?;

        Ok(ClosureReport {
            requisition_id: requisition.id,
            code: requisition.code.clone(),
            status: requisition.status,
            released: requisition
                .lines
                .iter()
                .filter(|l| l.undelivered_qty() > Decimal::ZERO)
                .map(LineProgress::from)
                .collect(),
        })
    }
}
