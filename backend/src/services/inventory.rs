//! Read-only inventory projections: stock with alerts, valuation, holdings

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{AlertState, Asset, Existence, PpeDelivery, Stock};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repositories::{LedgerStore, LedgerTx};
use crate::services::finish;

/// Service for stock, valuation and custody lookups
#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn LedgerStore>,
}

/// Stock row with its alert level
#[derive(Debug, Clone, Serialize)]
pub struct StockView {
    #[serde(flatten)]
    pub stock: Stock,
    pub alert_state: AlertState,
}

impl From<Stock> for StockView {
    fn from(stock: Stock) -> Self {
        let alert_state = stock.alert_state();
        Self { stock, alert_state }
    }
}

/// Existence card with its valuation
#[derive(Debug, Clone, Serialize)]
pub struct ExistenceView {
    #[serde(flatten)]
    pub existence: Existence,
    pub total_value: Decimal,
}

impl From<Existence> for ExistenceView {
    fn from(existence: Existence) -> Self {
        let total_value = existence.total_value();
        Self {
            existence,
            total_value,
        }
    }
}

impl InventoryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Stock of one material in one warehouse
    pub async fn stock(&self, warehouse_id: Uuid, material_id: Uuid) -> AppResult<StockView> {
        let mut tx = self.store.begin().await?;
        let result = tx.find_stock(warehouse_id, material_id).await;
        finish(tx, result)
            .await?
            .map(StockView::from)
            .ok_or_else(|| AppError::NotFound("Stock".to_string()))
    }

    /// Every stock row of a warehouse
    pub async fn warehouse_stock(&self, warehouse_id: Uuid) -> AppResult<Vec<StockView>> {
        let mut tx = self.store.begin().await?;
        let result = Self::warehouse_rows(&mut *tx, warehouse_id).await;
        let stocks = finish(tx, result).await?;
        Ok(stocks.into_iter().map(StockView::from).collect())
    }

    /// Rows at or near their reorder point, critical first
    pub async fn low_stock(&self, warehouse_id: Uuid) -> AppResult<Vec<StockView>> {
        let mut low: Vec<StockView> = self
            .warehouse_stock(warehouse_id)
            .await?
            .into_iter()
            .filter(|v| v.alert_state != AlertState::Ok)
            .collect();
        low.sort_by_key(|v| v.alert_state != AlertState::Critical);

        if !low.is_empty() {
            tracing::debug!(warehouse_id = %warehouse_id, rows = low.len(), "Low stock");
        }
        Ok(low)
    }

    /// Project-wide card of a material
    pub async fn existence(&self, project_id: Uuid, material_id: Uuid) -> AppResult<ExistenceView> {
        let mut tx = self.store.begin().await?;
        let result = tx.find_existence(project_id, material_id).await;
        finish(tx, result)
            .await?
            .map(ExistenceView::from)
            .ok_or_else(|| AppError::NotFound("Existence".to_string()))
    }

    pub async fn asset(&self, asset_id: Uuid) -> AppResult<Asset> {
        let mut tx = self.store.begin().await?;
        let result = tx.find_asset(asset_id).await;
        finish(tx, result)
            .await?
            .ok_or_else(|| AppError::NotFound("Asset".to_string()))
    }

    /// Assets a worker still holds; an empty list clears the worker
    pub async fn assets_held_by(&self, worker_id: Uuid) -> AppResult<Vec<Asset>> {
        let mut tx = self.store.begin().await?;
        let result = Self::holdings(&mut *tx, worker_id).await;
        finish(tx, result).await
    }

    pub async fn ppe_deliveries(&self, worker_id: Uuid) -> AppResult<Vec<PpeDelivery>> {
        let mut tx = self.store.begin().await?;
        let result = tx.ppe_deliveries_for(worker_id).await;
        finish(tx, result).await
    }

    async fn warehouse_rows(tx: &mut dyn LedgerTx, warehouse_id: Uuid) -> AppResult<Vec<Stock>> {
        tx.get_warehouse(warehouse_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;
        tx.stocks_in_warehouse(warehouse_id).await
    }

    async fn holdings(tx: &mut dyn LedgerTx, worker_id: Uuid) -> AppResult<Vec<Asset>> {
        tx.get_worker(worker_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Worker".to_string()))?;
        tx.assets_held_by(worker_id).await
    }
}
