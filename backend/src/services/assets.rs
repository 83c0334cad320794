//! Direct asset administration outside of movements
//!
//! Hand-overs here never touch stock: the asset stays counted in its
//! warehouse and only its state, holder and assignment history change.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use shared::{Asset, AssetAssignment, AssetState, Worker};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repositories::{LedgerStore, LedgerTx};
use crate::services::finish;

/// Service for assigning and returning fixed assets
#[derive(Clone)]
pub struct AssetService {
    store: Arc<dyn LedgerStore>,
}

/// Input for handing an asset or kit to a worker
#[derive(Debug, Deserialize)]
pub struct AssignInput {
    pub worker_id: Uuid,
    #[serde(default)]
    pub notes: String,
}

/// Input for taking an asset back
#[derive(Debug, Default, Deserialize)]
pub struct ReturnInput {
    #[serde(default)]
    pub notes: String,
}

async fn active_worker(tx: &mut dyn LedgerTx, worker_id: Uuid) -> AppResult<Worker> {
    let worker = tx
        .get_worker(worker_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Worker".to_string()))?;

    if !worker.is_active {
        return Err(AppError::validation(
            "worker_id",
            &format!("Worker {} is inactive", worker.full_name()),
            &format!("El trabajador {} está inactivo", worker.full_name()),
        ));
    }
    Ok(worker)
}

async fn hand_over(
    tx: &mut dyn LedgerTx,
    asset: &mut Asset,
    worker: &Worker,
    notes: String,
) -> AppResult<()> {
    if !asset.is_available() {
        return Err(AppError::AssetUnavailable {
            asset: asset.code.clone(),
            state: asset.state,
        });
    }

    asset.state = AssetState::Assigned;
    asset.current_holder_id = Some(worker.id);
    tx.save_asset(asset).await?;

    let assignment = AssetAssignment::open(asset.id, worker.id, Utc::now(), notes, None);
    tx.insert_assignment(&assignment).await
}

impl AssetService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Hand a single available asset to a worker
    pub async fn assign(&self, asset_id: Uuid, input: AssignInput) -> AppResult<Asset> {
        let mut tx = self.store.begin().await?;
        let result = Self::assign_in(&mut *tx, asset_id, input).await;
        let asset = finish(tx, result).await?;

        tracing::info!(asset = %asset.code, "Asset assigned");
        Ok(asset)
    }

    /// Take an assigned asset back into its warehouse
    pub async fn return_to_stock(&self, asset_id: Uuid, input: ReturnInput) -> AppResult<Asset> {
        let mut tx = self.store.begin().await?;
        let result = Self::return_in(&mut *tx, asset_id, input).await;
        let asset = finish(tx, result).await?;

        tracing::info!(asset = %asset.code, "Asset returned");
        Ok(asset)
    }

    /// Hand every asset of a kit to one worker, all or nothing
    pub async fn assign_kit(&self, kit_id: Uuid, input: AssignInput) -> AppResult<Vec<Asset>> {
        let mut tx = self.store.begin().await?;
        let result = Self::assign_kit_in(&mut *tx, kit_id, input).await;
        let assets = finish(tx, result).await?;

        tracing::info!(kit_id = %kit_id, assets = assets.len(), "Kit assigned");
        Ok(assets)
    }

    async fn assign_in(
        tx: &mut dyn LedgerTx,
        asset_id: Uuid,
        input: AssignInput,
    ) -> AppResult<Asset> {
        let mut asset = tx
            .lock_asset(asset_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Asset".to_string()))?;

        if asset.kit_id.is_some() {
            return Err(AppError::validation(
                "asset_id",
                &format!("Asset {} belongs to a kit; assign the kit instead", asset.code),
                &format!("El activo {} pertenece a un kit; asigne el kit", asset.code),
            ));
        }

        let worker = active_worker(tx, input.worker_id).await?;
        hand_over(tx, &mut asset, &worker, input.notes).await?;
        Ok(asset)
    }

    async fn return_in(
        tx: &mut dyn LedgerTx,
        asset_id: Uuid,
        input: ReturnInput,
    ) -> AppResult<Asset> {
        let mut asset = tx
            .lock_asset(asset_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Asset".to_string()))?;

        if asset.state != AssetState::Assigned {
            return Err(AppError::InvalidState(format!(
                "asset {} is {}, only assigned assets can be returned",
                asset.code, asset.state
            )));
        }

        if let Some(mut assignment) = tx.open_assignment(asset.id).await? {
            assignment.close(Utc::now(), None);
            if !input.notes.is_empty() {
                assignment.notes = if assignment.notes.is_empty() {
                    input.notes
                } else {
                    format!("{} | {}", assignment.notes, input.notes)
                };
            }
            tx.save_assignment(&assignment).await?;
        }

        asset.shelve(asset.location_id);
        tx.save_asset(&asset).await?;
        Ok(asset)
    }

    async fn assign_kit_in(
        tx: &mut dyn LedgerTx,
        kit_id: Uuid,
        input: AssignInput,
    ) -> AppResult<Vec<Asset>> {
        let kit = tx
            .find_kit(kit_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Kit".to_string()))?;
        let worker = active_worker(tx, input.worker_id).await?;

        let mut members = tx.lock_kit_assets(kit.id).await?;
        if members.is_empty() {
            return Err(AppError::validation(
                "kit_id",
                &format!("Kit {} has no assets", kit.code),
                &format!("El kit {} no tiene activos", kit.code),
            ));
        }

        if let Some(busy) = members.iter().find(|a| !a.is_available()) {
            return Err(AppError::AssetUnavailable {
                asset: busy.code.clone(),
                state: busy.state,
            });
        }

        let note = format!("KIT {}: {}", kit.code, input.notes);
        for asset in &mut members {
            hand_over(tx, asset, &worker, note.clone()).await?;
        }

        Ok(members)
    }
}
