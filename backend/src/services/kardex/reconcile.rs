//! Requisition bookkeeping for movement lines
//!
//! Inbound lines raise `received_qty` on the requisition they were bought
//! for; outbound lines raise `fulfilled_qty` on the requisition they hand
//! material to. The requisition actually used is written back to the line so
//! reversal unwinds the same one.

use rust_decimal::Decimal;
use shared::{Movement, MovementLine, Requisition};
use uuid::Uuid;

use super::Scope;
use crate::error::{AppError, AppResult};
use crate::repositories::LedgerTx;

/// Takes the row locks of the given requisitions in the order given
pub(super) async fn lock_in_order(
    tx: &mut dyn LedgerTx,
    requisition_ids: &[Uuid],
) -> AppResult<()> {
    for &requisition_id in requisition_ids {
        tx.lock_requisition(requisition_id).await?;
    }
    Ok(())
}

async fn lock_open(tx: &mut dyn LedgerTx, requisition_id: Uuid) -> AppResult<Requisition> {
    let requisition = tx
        .lock_requisition(requisition_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Requisition".to_string()))?;

    if !requisition.is_open() {
        return Err(AppError::InvalidState(format!(
            "requisition {} is {}",
            requisition.code,
            requisition.status.as_str()
        )));
    }
    Ok(requisition)
}

/// Credits an inbound line to its requisition: explicit link first, else FIFO
pub(super) async fn receive(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &mut MovementLine,
) -> AppResult<()> {
    let target = match movement.linked_requisition(line) {
        Some(requisition_id) => Some(lock_open(tx, requisition_id).await?),
        None if line.is_free_stock => None,
        None => {
            tx.lock_fifo_requisition(scope.project.id, line.material_id)
                .await?
        }
    };

    let Some(mut requisition) = target else {
        return Ok(());
    };
    let material = scope.material(line.material_id)?;
    let code = requisition.code.clone();

    let Some(requisition_line) = requisition.line_for_mut(line.material_id) else {
        tracing::warn!(
            requisition = %code,
            material = %material.code,
            "Requisition has no line for material; received as free stock"
        );
        return Ok(());
    };

    let outstanding = requisition_line.outstanding_receipt_qty();
    if line.quantity > outstanding {
        return Err(AppError::OverSupply {
            requisition: code,
            material: material.code.clone(),
            received: line.quantity,
            outstanding,
        });
    }
    requisition_line.received_qty += line.quantity;

    tx.save_requisition(&requisition).await?;
    line.resolved_requisition_id = Some(requisition.id);

    tracing::debug!(
        requisition = %code,
        material = %material.code,
        quantity = %line.quantity,
        "Receipt reconciled"
    );
    Ok(())
}

/// Charges an outbound line to the requisition it was linked to
pub(super) async fn fulfill(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &mut MovementLine,
) -> AppResult<()> {
    let Some(requisition_id) = movement.linked_requisition(line) else {
        return Ok(());
    };
    let material = scope.material(line.material_id)?;
    let mut requisition = lock_open(tx, requisition_id).await?;
    let code = requisition.code.clone();

    let requisition_line = requisition.line_for_mut(line.material_id).ok_or_else(|| {
        AppError::NotFound(format!("{} in requisition {}", material.code, code))
    })?;

    let pending = requisition_line.pending_qty();
    if line.quantity > pending {
        return Err(AppError::OverFulfillment {
            requisition: code,
            material: material.code.clone(),
            requested: line.quantity,
            pending,
        });
    }

    let undelivered = requisition_line.received_qty - requisition_line.fulfilled_qty;
    if line.quantity > undelivered {
        return Err(AppError::UndeliveredStock {
            requisition: code,
            material: material.code.clone(),
            requested: line.quantity,
            undelivered,
        });
    }

    requisition_line.fulfilled_qty += line.quantity;
    requisition.refresh_status_after_fulfillment();
    tx.save_requisition(&requisition).await?;
    line.resolved_requisition_id = Some(requisition.id);

    tracing::debug!(
        requisition = %code,
        material = %material.code,
        quantity = %line.quantity,
        status = requisition.status.as_str(),
        "Delivery reconciled"
    );
    Ok(())
}

/// Takes a reversed receipt back off the requisition it was credited to
pub(super) async fn unreceive(tx: &mut dyn LedgerTx, line: &MovementLine) -> AppResult<()> {
    let Some(requisition_id) = line.resolved_requisition_id else {
        return Ok(());
    };
    let Some(mut requisition) = tx.lock_requisition(requisition_id).await? else {
        return Ok(());
    };

    if let Some(requisition_line) = requisition.line_for_mut(line.material_id) {
        requisition_line.received_qty =
            (requisition_line.received_qty - line.quantity).max(Decimal::ZERO);
        tx.save_requisition(&requisition).await?;
    }
    Ok(())
}

/// Takes a reversed delivery back off its requisition and re-derives the status
pub(super) async fn unfulfill(tx: &mut dyn LedgerTx, line: &MovementLine) -> AppResult<()> {
    let Some(requisition_id) = line.resolved_requisition_id else {
        return Ok(());
    };
    let Some(mut requisition) = tx.lock_requisition(requisition_id).await? else {
        return Ok(());
    };

    if let Some(requisition_line) = requisition.line_for_mut(line.material_id) {
        requisition_line.fulfilled_qty =
            (requisition_line.fulfilled_qty - line.quantity).max(Decimal::ZERO);
    }
    requisition.refresh_status_after_reversal();
    tx.save_requisition(&requisition).await
}
