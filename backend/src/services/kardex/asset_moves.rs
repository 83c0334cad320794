//! Fixed-asset and PPE effects of movement lines

use rust_decimal::Decimal;
use shared::{
    asset_code, first_duplicate, parse_serials, validate_serial_count, Asset, AssetAssignment,
    AssetState, Direction, MaterialKind, Movement, MovementLine, MovementType, PpeDelivery,
};
use uuid::Uuid;

use super::Scope;
use crate::error::{AppError, AppResult};
use crate::repositories::LedgerTx;

/// Locks the asset a line points at and checks the line can carry it
async fn lock_linked(
    tx: &mut dyn LedgerTx,
    scope: &Scope,
    line: &MovementLine,
    asset_id: Uuid,
) -> AppResult<Asset> {
    let asset = tx
        .lock_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset".to_string()))?;

    if line.quantity != Decimal::ONE {
        return Err(AppError::validation(
            "quantity",
            &format!("A line carrying asset {} must move exactly one unit", asset.code),
            &format!("Una línea con el activo {} debe mover una sola unidad", asset.code),
        ));
    }
    if asset.material_id != line.material_id {
        let material = scope.material(line.material_id)?;
        return Err(AppError::validation(
            "asset_id",
            &format!("Asset {} is not a {}", asset.code, material.code),
            &format!("El activo {} no corresponde a {}", asset.code, material.code),
        ));
    }

    Ok(asset)
}

/// Registers one available asset per declared serial on a fixed-asset purchase
pub(super) async fn create_purchased(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &MovementLine,
    separator: char,
) -> AppResult<()> {
    let material = scope.material(line.material_id)?;
    if material.kind != MaterialKind::FixedAsset || movement.movement_type != MovementType::PurchaseIn
    {
        return Ok(());
    }

    let serials = parse_serials(line.serials.as_deref().unwrap_or_default(), separator);
    validate_serial_count(&serials, line.quantity).map_err(|_| AppError::SerialCountMismatch {
        material: material.code.clone(),
        expected: line.quantity,
        found: serials.len(),
    })?;

    if let Some(duplicate) = first_duplicate(&serials) {
        return Err(AppError::DuplicateSerial(duplicate.to_string()));
    }

    // Earlier lines of this movement are already visible to serial_exists
    for serial in &serials {
        if tx.serial_exists(serial).await? {
            return Err(AppError::DuplicateSerial(serial.clone()));
        }
    }

    for serial in &serials {
        let asset = Asset {
            id: Uuid::new_v4(),
            code: asset_code(&material.code, serial),
            material_id: material.id,
            serial: serial.clone(),
            state: AssetState::Available,
            location_id: Some(scope.warehouse_id),
            current_holder_id: None,
            origin_movement_id: Some(movement.id),
            kit_id: None,
        };
        tx.insert_asset(&asset).await?;
    }

    tracing::debug!(
        material = %material.code,
        count = serials.len(),
        "Registered purchased assets"
    );
    Ok(())
}

/// Brings a linked asset back onto the destination shelf
pub(super) async fn receive_linked(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &mut MovementLine,
    asset_id: Uuid,
) -> AppResult<()> {
    let mut asset = lock_linked(tx, scope, line, asset_id).await?;

    line.prior_asset = Some(asset.snapshot());
    asset.shelve(Some(scope.warehouse_id));
    tx.save_asset(&asset).await?;

    if let Some(mut assignment) = tx.open_assignment(asset.id).await? {
        assignment.close(movement.moved_at, Some(movement.id));
        tx.save_assignment(&assignment).await?;
    }

    Ok(())
}

/// Moves a linked asset out according to the movement type
pub(super) async fn issue_linked(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &MovementLine,
    asset_id: Uuid,
) -> AppResult<()> {
    let mut asset = lock_linked(tx, scope, line, asset_id).await?;

    if !asset.is_available() {
        return Err(AppError::AssetUnavailable {
            asset: asset.code,
            state: asset.state,
        });
    }

    match movement.movement_type {
        MovementType::TransferOut => asset.shelve(movement.destination_warehouse_id),
        MovementType::CentralReturnOut => {
            asset.state = AssetState::ReturnedExternal;
            asset.location_id = None;
            asset.current_holder_id = None;
        }
        _ => {
            asset.state = AssetState::Assigned;
            asset.location_id = Some(scope.warehouse_id);
            asset.current_holder_id = scope.worker.as_ref().map(|w| w.id);

            if let Some(worker) = &scope.worker {
                let assignment = AssetAssignment::open(
                    asset.id,
                    worker.id,
                    movement.moved_at,
                    format!("{} {}", movement.movement_type, movement.reference_document),
                    Some(movement.id),
                );
                tx.insert_assignment(&assignment).await?;
            }
        }
    }

    tx.save_asset(&asset).await
}

/// PPE handed to a named worker is recorded for the HR file
pub(super) async fn record_ppe_delivery(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &MovementLine,
) -> AppResult<()> {
    let material = scope.material(line.material_id)?;
    let Some(worker) = &scope.worker else {
        return Ok(());
    };
    if material.kind != MaterialKind::Ppe {
        return Ok(());
    }

    let delivery = PpeDelivery {
        id: Uuid::new_v4(),
        worker_id: worker.id,
        material_id: material.id,
        quantity: line.quantity,
        movement_id: movement.id,
        delivered_at: movement.moved_at,
    };
    tx.insert_ppe_delivery(&delivery).await
}

/// Puts a linked asset back the way it was before an inbound line moved it
pub(super) async fn restore_linked(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    line: &MovementLine,
) -> AppResult<()> {
    let (Some(asset_id), Some(prior)) = (line.asset_id, line.prior_asset) else {
        return Ok(());
    };

    let mut asset = tx
        .lock_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset".to_string()))?;

    if !asset.is_available() || asset.location_id != Some(scope.warehouse_id) {
        return Err(AppError::CannotReverse(format!(
            "asset {} has moved since it was received ({})",
            asset.code, asset.state
        )));
    }

    asset.restore(prior);
    tx.save_asset(&asset).await?;

    if let Some(mut assignment) = tx.assignment_closed_by(asset.id, movement.id).await? {
        assignment.reopen();
        tx.save_assignment(&assignment).await?;
    }

    Ok(())
}

/// Returns an issued asset to the source warehouse with no holder.
///
/// The asset must still be where this movement left it: with the worker it
/// was handed to under the assignment this movement opened, on the
/// destination shelf of a transfer, or at the head office.
pub(super) async fn recall_issued(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
    asset_id: Uuid,
) -> AppResult<()> {
    let mut asset = tx
        .lock_asset(asset_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Asset".to_string()))?;

    let untouched = match movement.movement_type {
        MovementType::TransferOut => {
            asset.is_available() && asset.location_id == movement.destination_warehouse_id
        }
        MovementType::CentralReturnOut => asset.state == AssetState::ReturnedExternal,
        _ => {
            let handover_open = match movement.worker_id {
                Some(_) => tx
                    .open_assignment(asset.id)
                    .await?
                    .is_some_and(|a| a.movement_id == Some(movement.id)),
                None => true,
            };
            asset.state == AssetState::Assigned
                && asset.current_holder_id == movement.worker_id
                && handover_open
        }
    };

    if !untouched {
        return Err(AppError::CannotReverse(format!(
            "asset {} has moved since it was issued ({})",
            asset.code, asset.state
        )));
    }

    asset.shelve(movement.source_warehouse_id.or(Some(scope.warehouse_id)));
    tx.save_asset(&asset).await
}

/// Locks the assets a purchase created and checks none has left the shelf
pub(super) async fn lock_created_assets(
    tx: &mut dyn LedgerTx,
    movement: &Movement,
    scope: &Scope,
) -> AppResult<usize> {
    if movement.movement_type != MovementType::PurchaseIn || scope.direction != Direction::Inbound {
        return Ok(0);
    }

    let created = tx.lock_assets_by_origin(movement.id).await?;
    if let Some(moved) = created
        .iter()
        .find(|a| !a.is_available() || a.location_id != Some(scope.warehouse_id))
    {
        return Err(AppError::CannotReverse(format!(
            "asset {} created by this purchase is {}",
            moved.code, moved.state
        )));
    }

    Ok(created.len())
}
