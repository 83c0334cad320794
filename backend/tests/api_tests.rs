//! HTTP surface tests
//!
//! Drives the router with `oneshot` requests against the in-memory ledger.

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::Fixture;
use kardex_backend::config::{DatabaseConfig, KardexConfig, ServerConfig};
use kardex_backend::{create_app, AppState, Config};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app(fx: &Fixture) -> Router {
    let config = Config {
        environment: "test".to_string(),
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/kardex_test".to_string(),
            max_connections: 1,
            min_connections: 0,
            lock_timeout_ms: 1000,
        },
        kardex: KardexConfig::default(),
    };

    create_app(AppState {
        store: fx.store(),
        db: None,
        config: Arc::new(config),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(json) => request.body(Body::from(json.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_reports_in_memory_store() {
    let fx = Fixture::new().await;
    let app = app(&fx);

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "in-memory");
}

#[tokio::test]
async fn test_draft_confirm_and_query_stock() {
    let fx = Fixture::new().await;
    let app = app(&fx);

    let draft = json!({
        "project_id": fx.project.id,
        "movement_type": "purchase_in",
        "reference_document": "F001-0042",
        "destination_warehouse_id": fx.warehouse.id,
        "lines": [
            { "material_id": fx.cement.id, "quantity": "40", "unit_cost": "22.50" }
        ]
    });
    let (status, created) = send(&app, "POST", "/api/v1/movements", Some(draft)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "draft");
    assert_eq!(created["entry_note"], "NI-00001");

    let id = created["id"].as_str().unwrap().to_string();
    let (status, confirmed) =
        send(&app, "POST", &format!("/api/v1/movements/{}/confirm", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, stock) = send(
        &app,
        "GET",
        &format!("/api/v1/stock/{}/{}", fx.warehouse.id, fx.cement.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stock["quantity"], "40");
    assert_eq!(stock["alert_state"], "ok");

    let (status, existence) = send(
        &app,
        "GET",
        &format!("/api/v1/existences/{}/{}", fx.project.id, fx.cement.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let total_value: Decimal = existence["total_value"].as_str().unwrap().parse().unwrap();
    assert_eq!(total_value, Decimal::from(900));
}

#[tokio::test]
async fn test_rule_violation_maps_to_unprocessable() {
    let fx = Fixture::new().await;
    let app = app(&fx);

    let draft = json!({
        "project_id": fx.project.id,
        "movement_type": "office_out",
        "reference_document": "VS-0001",
        "source_warehouse_id": fx.warehouse.id,
        "worker_id": fx.worker.id,
        "lines": [ { "material_id": fx.cement.id, "quantity": "5" } ]
    });
    let (_, created) = send(&app, "POST", "/api/v1/movements", Some(draft)).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) =
        send(&app, "POST", &format!("/api/v1/movements/{}/confirm", id), None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_missing_header_field_is_bad_request() {
    let fx = Fixture::new().await;
    let app = app(&fx);

    let draft = json!({
        "project_id": fx.project.id,
        "movement_type": "site_out",
        "reference_document": "VS-0002",
        "source_warehouse_id": fx.warehouse.id,
        "worker_id": fx.worker.id,
        "lines": [ { "material_id": fx.cement.id, "quantity": "1" } ]
    });
    let (status, body) = send(&app, "POST", "/api/v1/movements", Some(draft)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "tower_id");
}

#[tokio::test]
async fn test_unknown_asset_is_not_found() {
    let fx = Fixture::new().await;
    let app = app(&fx);

    let (status, _) = send(&app, "GET", &format!("/api/v1/assets/{}", Uuid::new_v4()), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stock_alerts_route() {
    let fx = Fixture::new().await;
    let app = app(&fx);
    fx.purchase(fx.cement.id, 5, "10").await;
    let mut stock = fx
        .store
        .snapshot()
        .await
        .stock(fx.warehouse.id, fx.cement.id)
        .cloned()
        .unwrap();
    stock.minimum_quantity = Decimal::from(10);
    fx.store.insert_stock(stock).await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/v1/stock/{}/alerts", fx.warehouse.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["alert_state"], "critical");
}
