//! HTTP handlers for stock and existence lookups

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::inventory::{ExistenceView, StockView};
use crate::services::InventoryService;
use crate::AppState;

/// List the stock of a warehouse with alert levels
pub async fn list_warehouse_stock(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockView>>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.warehouse_stock(warehouse_id).await?))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path((warehouse_id, material_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<StockView>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.stock(warehouse_id, material_id).await?))
}

/// Rows of a warehouse at or near their reorder point
pub async fn get_stock_alerts(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockView>>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.low_stock(warehouse_id).await?))
}

/// Project-wide quantity and valuation of a material
pub async fn get_existence(
    State(state): State<AppState>,
    Path((project_id, material_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ExistenceView>> {
    let service = InventoryService::new(state.store);
    Ok(Json(service.existence(project_id, material_id).await?))
}
