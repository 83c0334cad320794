//! Route definitions for the Site Kardex API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/movements", movement_routes())
        .nest("/stock", stock_routes())
        .route(
            "/existences/:project_id/:material_id",
            get(handlers::get_existence),
        )
        .nest("/requisitions", requisition_routes())
        .nest("/assets", asset_routes())
        .route("/kits/:kit_id/assign", post(handlers::assign_kit))
        .nest("/workers", worker_routes())
}

/// Movement routes
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_movement))
        .route("/:movement_id", get(handlers::get_movement))
        .route("/:movement_id/confirm", post(handlers::confirm_movement))
        .route("/:movement_id/reverse", post(handlers::reverse_movement))
}

/// Stock routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/:warehouse_id", get(handlers::list_warehouse_stock))
        .route("/:warehouse_id/alerts", get(handlers::get_stock_alerts))
        .route("/:warehouse_id/:material_id", get(handlers::get_stock))
}

/// Requisition routes
fn requisition_routes() -> Router<AppState> {
    Router::new()
        .route("/:requisition_id/fulfillment", get(handlers::get_fulfillment))
        .route("/:requisition_id/close", post(handlers::close_requisition))
}

/// Fixed asset routes
fn asset_routes() -> Router<AppState> {
    Router::new()
        .route("/:asset_id", get(handlers::get_asset))
        .route("/:asset_id/assign", post(handlers::assign_asset))
        .route("/:asset_id/return", post(handlers::return_asset))
}

/// Worker custody routes
fn worker_routes() -> Router<AppState> {
    Router::new()
        .route("/:worker_id/assets", get(handlers::get_worker_assets))
        .route("/:worker_id/ppe", get(handlers::get_worker_ppe))
}
