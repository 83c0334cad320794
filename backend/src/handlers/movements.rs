//! HTTP handlers for movement drafting, confirmation and reversal

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::Movement;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::movement::CreateMovementInput;
use crate::services::{KardexService, MovementService};
use crate::AppState;

fn kardex(state: &AppState) -> KardexService {
    KardexService::new(state.store.clone(), state.config.kardex.clone())
}

/// Create a draft movement
pub async fn create_movement(
    State(state): State<AppState>,
    Json(input): Json<CreateMovementInput>,
) -> AppResult<(StatusCode, Json<Movement>)> {
    let service = MovementService::new(state.store);
    let movement = service.create_draft(input).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// Get a movement with its lines
pub async fn get_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<Movement>> {
    let service = MovementService::new(state.store);
    Ok(Json(service.get(movement_id).await?))
}

/// Apply a draft movement to the ledger
pub async fn confirm_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<Movement>> {
    let movement = kardex(&state).confirm(movement_id).await?;
    Ok(Json(movement))
}

/// Cancel a movement, undoing its effects when it was confirmed
pub async fn reverse_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<Movement>> {
    let movement = kardex(&state).reverse(movement_id).await?;
    Ok(Json(movement))
}
