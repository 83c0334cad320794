//! HTTP handlers for fixed assets, kits and worker custody

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{Asset, PpeDelivery};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::assets::{AssignInput, ReturnInput};
use crate::services::{AssetService, InventoryService};
use crate::AppState;

pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
) -> AppResult<Json<Asset>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.asset(asset_id).await?))
}

/// Hand an asset to a worker
pub async fn assign_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    Json(input): Json<AssignInput>,
) -> AppResult<Json<Asset>> {
    let service = AssetService::new(state.store);
    Ok(Json(service.assign(asset_id, input).await?))
}

/// Take an assigned asset back to its warehouse
pub async fn return_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    input: Option<Json<ReturnInput>>,
) -> AppResult<Json<Asset>> {
    let service = AssetService::new(state.store);
    let input = input.map(|Json(i)| i).unwrap_or_default();
    Ok(Json(service.return_to_stock(asset_id, input).await?))
}

/// Hand every asset of a kit to a worker
pub async fn assign_kit(
    State(state): State<AppState>,
    Path(kit_id): Path<Uuid>,
    Json(input): Json<AssignInput>,
) -> AppResult<Json<Vec<Asset>>> {
    let service = AssetService::new(state.store);
    Ok(Json(service.assign_kit(kit_id, input).await?))
}

/// Assets a worker still holds
pub async fn get_worker_assets(
    State(state): State<AppState>,
    Path(worker_id): Path<Uuid>,
) -> AppResult<Json<Vec<Asset>>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.assets_held_by(worker_id).await?))
}

pub async fn get_worker_ppe(
    State(state): State<AppState>,
    Path(worker_id): Path<Uuid>,
) -> AppResult<Json<Vec<PpeDelivery>>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.ppe_deliveries(worker_id).await?))
}
