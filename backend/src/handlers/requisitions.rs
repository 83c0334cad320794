//! HTTP handlers for requisition progress and closure

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::requisition::{ClosureReport, FulfillmentReport};
use crate::services::RequisitionService;
use crate::AppState;

pub async fn get_fulfillment(
    State(state): State<AppState>,
    Path(requisition_id): Path<Uuid>,
) -> AppResult<Json<FulfillmentReport>> {
    let service = RequisitionService::new(state.store);
    Ok(Json(service.fulfillment(requisition_id).await?))
}

/// Close an open requisition by hand
pub async fn close_requisition(
    State(state): State<AppState>,
    Path(requisition_id): Path<Uuid>,
) -> AppResult<Json<ClosureReport>> {
    let service = RequisitionService::new(state.store);
    Ok(Json(service.close(requisition_id).await?))
}
