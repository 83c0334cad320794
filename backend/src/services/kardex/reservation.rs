//! Free-stock protection for outbound lines without a requisition
//!
//! Material received for an open requisition but not yet handed over is
//! reserved. A withdrawal that names no requisition may only take what is
//! left of the project total after those reservations.

use rust_decimal::Decimal;
use shared::Material;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repositories::{LedgerTx, Reservation};

/// Codes of the first `limit` reserving requisitions, with an ellipsis when more exist
pub fn describe_reservations(reservations: &[Reservation], limit: usize) -> String {
    let mut listed = reservations
        .iter()
        .take(limit)
        .map(|r| r.requisition_code.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if reservations.len() > limit {
        listed.push_str(", ...");
    }
    listed
}

/// Quantity that may leave without touching reservations
pub fn free_quantity(project_total: Decimal, reservations: &[Reservation]) -> Decimal {
    let reserved: Decimal = reservations.iter().map(|r| r.quantity).sum();
    (project_total - reserved).max(Decimal::ZERO)
}

pub(super) async fn guard_free_stock(
    tx: &mut dyn LedgerTx,
    project_id: Uuid,
    material: &Material,
    project_total: Decimal,
    quantity: Decimal,
    report_limit: usize,
) -> AppResult<()> {
    let reservations = tx.open_reservations(project_id, material.id).await?;
    if reservations.is_empty() {
        return Ok(());
    }

    let free = free_quantity(project_total, &reservations);
    if quantity > free {
        return Err(AppError::ReservedStockViolation {
            material: material.code.clone(),
            requested: quantity,
            free,
            reserved: reservations.iter().map(|r| r.quantity).sum(),
            requisitions: describe_reservations(&reservations, report_limit),
        });
    }
    Ok(())
}
