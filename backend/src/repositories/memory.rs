//! In-memory ledger store
//!
//! A single async mutex guards the whole ledger, so transactions are fully
//! serialized. Each transaction works on a copy of the state that replaces
//! the shared state on commit and is dropped on rollback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    Asset, AssetAssignment, Existence, Kit, Material, Movement, PpeDelivery, Project, Requisition,
    Stock, Warehouse, Worker,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    AssetRepository, CatalogRepository, ExistenceRepository, LedgerStore, LedgerTx,
    MovementRepository, Reservation, RequisitionRepository, StockRepository,
};
use crate::error::AppResult;

/// Complete ledger contents
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    projects: HashMap<Uuid, Project>,
    warehouses: HashMap<Uuid, Warehouse>,
    materials: HashMap<Uuid, Material>,
    workers: HashMap<Uuid, Worker>,
    movements: HashMap<Uuid, Movement>,
    stocks: HashMap<(Uuid, Uuid), Stock>,
    existences: HashMap<(Uuid, Uuid), Existence>,
    requisitions: HashMap<Uuid, Requisition>,
    assets: HashMap<Uuid, Asset>,
    kits: HashMap<Uuid, Kit>,
    assignments: Vec<AssetAssignment>,
    ppe_deliveries: Vec<PpeDelivery>,
    entry_note_sequences: HashMap<Uuid, i64>,
}

impl LedgerState {
    pub fn stock(&self, warehouse_id: Uuid, material_id: Uuid) -> Option<&Stock> {
        self.stocks.get(&(warehouse_id, material_id))
    }

    pub fn existence(&self, project_id: Uuid, material_id: Uuid) -> Option<&Existence> {
        self.existences.get(&(project_id, material_id))
    }

    pub fn movement(&self, id: Uuid) -> Option<&Movement> {
        self.movements.get(&id)
    }

    pub fn requisition(&self, id: Uuid) -> Option<&Requisition> {
        self.requisitions.get(&id)
    }

    pub fn asset(&self, id: Uuid) -> Option<&Asset> {
        self.assets.get(&id)
    }

    pub fn asset_by_serial(&self, serial: &str) -> Option<&Asset> {
        self.assets.values().find(|a| a.serial == serial)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn assignments_of(&self, asset_id: Uuid) -> Vec<&AssetAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.asset_id == asset_id)
            .collect()
    }

    pub fn ppe_deliveries(&self) -> &[PpeDelivery] {
        &self.ppe_deliveries
    }

    /// Sum of stock of a material over every warehouse of a project
    pub fn project_stock_total(&self, project_id: Uuid, material_id: Uuid) -> Decimal {
        self.stocks
            .values()
            .filter(|s| s.material_id == material_id)
            .filter(|s| {
                self.warehouses
                    .get(&s.warehouse_id)
                    .is_some_and(|w| w.project_id == project_id)
            })
            .map(|s| s.quantity)
            .sum()
    }

    fn open_requisitions_for(&self, project_id: Uuid, material_id: Uuid) -> Vec<&Requisition> {
        let mut open: Vec<&Requisition> = self
            .requisitions
            .values()
            .filter(|r| r.project_id == project_id && r.is_open())
            .filter(|r| r.line_for(material_id).is_some())
            .collect();
        open.sort_by(|a, b| {
            a.requested_on
                .cmp(&b.requested_on)
                .then_with(|| a.code.cmp(&b.code))
        });
        open
    }
}

/// Ledger store backed by process memory
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> LedgerState {
        self.state.lock().await.clone()
    }

    pub async fn insert_project(&self, project: Project) {
        self.state.lock().await.projects.insert(project.id, project);
    }

    pub async fn insert_warehouse(&self, warehouse: Warehouse) {
        self.state
            .lock()
            .await
            .warehouses
            .insert(warehouse.id, warehouse);
    }

    pub async fn insert_material(&self, material: Material) {
        self.state
            .lock()
            .await
            .materials
            .insert(material.id, material);
    }

    pub async fn insert_worker(&self, worker: Worker) {
        self.state.lock().await.workers.insert(worker.id, worker);
    }

    pub async fn insert_requisition(&self, requisition: Requisition) {
        self.state
            .lock()
            .await
            .requisitions
            .insert(requisition.id, requisition);
    }

    pub async fn insert_kit(&self, kit: Kit) {
        self.state.lock().await.kits.insert(kit.id, kit);
    }

    pub async fn insert_asset(&self, asset: Asset) {
        self.state.lock().await.assets.insert(asset.id, asset);
    }

    pub async fn insert_stock(&self, stock: Stock) {
        self.state
            .lock()
            .await
            .stocks
            .insert((stock.warehouse_id, stock.material_id), stock);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

/// Transaction holding the global lock and a working copy
pub struct InMemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogRepository for InMemoryTx {
    async fn get_project(&mut self, id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.working.projects.get(&id).cloned())
    }

    async fn get_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        Ok(self.working.warehouses.get(&id).cloned())
    }

    async fn get_material(&mut self, id: Uuid) -> AppResult<Option<Material>> {
        Ok(self.working.materials.get(&id).cloned())
    }

    async fn get_worker(&mut self, id: Uuid) -> AppResult<Option<Worker>> {
        Ok(self.working.workers.get(&id).cloned())
    }
}

#[async_trait]
impl MovementRepository for InMemoryTx {
    async fn find_movement(&mut self, id: Uuid) -> AppResult<Option<Movement>> {
        Ok(self.working.movements.get(&id).cloned())
    }

    async fn lock_movement(&mut self, id: Uuid) -> AppResult<Option<Movement>> {
        Ok(self.working.movements.get(&id).cloned())
    }

    async fn insert_movement(&mut self, movement: &Movement) -> AppResult<()> {
        self.working.movements.insert(movement.id, movement.clone());
        Ok(())
    }

    async fn save_movement(&mut self, movement: &Movement) -> AppResult<()> {
        self.working.movements.insert(movement.id, movement.clone());
        Ok(())
    }

    async fn next_entry_note_sequence(&mut self, project_id: Uuid) -> AppResult<i64> {
        let sequence = self
            .working
            .entry_note_sequences
            .entry(project_id)
            .or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }
}

#[async_trait]
impl StockRepository for InMemoryTx {
    async fn lock_stock(&mut self, warehouse_id: Uuid, material_id: Uuid) -> AppResult<Stock> {
        Ok(self
            .working
            .stocks
            .entry((warehouse_id, material_id))
            .or_insert_with(|| Stock::new(warehouse_id, material_id))
            .clone())
    }

    async fn save_stock(&mut self, stock: &Stock) -> AppResult<()> {
        self.working
            .stocks
            .insert((stock.warehouse_id, stock.material_id), stock.clone());
        Ok(())
    }

    async fn find_stock(
        &mut self,
        warehouse_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Stock>> {
        Ok(self.working.stock(warehouse_id, material_id).cloned())
    }

    async fn stocks_in_warehouse(&mut self, warehouse_id: Uuid) -> AppResult<Vec<Stock>> {
        let mut stocks: Vec<Stock> = self
            .working
            .stocks
            .values()
            .filter(|s| s.warehouse_id == warehouse_id)
            .cloned()
            .collect();
        stocks.sort_by_key(|s| s.material_id);
        Ok(stocks)
    }
}

#[async_trait]
impl ExistenceRepository for InMemoryTx {
    async fn lock_existence(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Existence> {
        Ok(self
            .working
            .existences
            .entry((project_id, material_id))
            .or_insert_with(|| Existence::new(project_id, material_id))
            .clone())
    }

    async fn save_existence(&mut self, existence: &Existence) -> AppResult<()> {
        self.working.existences.insert(
            (existence.project_id, existence.material_id),
            existence.clone(),
        );
        Ok(())
    }

    async fn find_existence(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Existence>> {
        Ok(self.working.existence(project_id, material_id).cloned())
    }
}

#[async_trait]
impl RequisitionRepository for InMemoryTx {
    async fn find_requisition(&mut self, id: Uuid) -> AppResult<Option<Requisition>> {
        Ok(self.working.requisitions.get(&id).cloned())
    }

    async fn lock_requisition(&mut self, id: Uuid) -> AppResult<Option<Requisition>> {
        Ok(self.working.requisitions.get(&id).cloned())
    }

    async fn lock_fifo_requisition(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Requisition>> {
        Ok(self
            .working
            .open_requisitions_for(project_id, material_id)
            .into_iter()
            .find(|r| {
                r.line_for(material_id)
                    .is_some_and(|l| l.outstanding_receipt_qty() > Decimal::ZERO)
            })
            .cloned())
    }

    async fn open_reservations(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Vec<Reservation>> {
        Ok(self
            .working
            .open_requisitions_for(project_id, material_id)
            .into_iter()
            .filter_map(|r| {
                let line = r.line_for(material_id)?;
                let quantity = line.received_qty - line.fulfilled_qty;
                (quantity > Decimal::ZERO).then(|| Reservation {
                    requisition_id: r.id,
                    requisition_code: r.code.clone(),
                    quantity,
                })
            })
            .collect())
    }

    async fn save_requisition(&mut self, requisition: &Requisition) -> AppResult<()> {
        self.working
            .requisitions
            .insert(requisition.id, requisition.clone());
        Ok(())
    }
}

#[async_trait]
impl AssetRepository for InMemoryTx {
    async fn find_asset(&mut self, id: Uuid) -> AppResult<Option<Asset>> {
        Ok(self.working.assets.get(&id).cloned())
    }

    async fn lock_asset(&mut self, id: Uuid) -> AppResult<Option<Asset>> {
        Ok(self.working.assets.get(&id).cloned())
    }

    async fn lock_kit_assets(&mut self, kit_id: Uuid) -> AppResult<Vec<Asset>> {
        let mut members: Vec<Asset> = self
            .working
            .assets
            .values()
            .filter(|a| a.kit_id == Some(kit_id))
            .cloned()
            .collect();
        members.sort_by_key(|a| a.id);
        Ok(members)
    }

    async fn find_kit(&mut self, id: Uuid) -> AppResult<Option<Kit>> {
        Ok(self.working.kits.get(&id).cloned())
    }

    async fn serial_exists(&mut self, serial: &str) -> AppResult<bool> {
        Ok(self.working.asset_by_serial(serial).is_some())
    }

    async fn insert_asset(&mut self, asset: &Asset) -> AppResult<()> {
        self.working.assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn save_asset(&mut self, asset: &Asset) -> AppResult<()> {
        self.working.assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn lock_assets_by_origin(&mut self, movement_id: Uuid) -> AppResult<Vec<Asset>> {
        let mut created: Vec<Asset> = self
            .working
            .assets
            .values()
            .filter(|a| a.origin_movement_id == Some(movement_id))
            .cloned()
            .collect();
        created.sort_by_key(|a| a.id);
        Ok(created)
    }

    async fn delete_assets_by_origin(&mut self, movement_id: Uuid) -> AppResult<()> {
        let removed: Vec<Uuid> = self
            .working
            .assets
            .values()
            .filter(|a| a.origin_movement_id == Some(movement_id))
            .map(|a| a.id)
            .collect();
        self.working.assets.retain(|_, a| a.origin_movement_id != Some(movement_id));
        self.working
            .assignments
            .retain(|a| !removed.contains(&a.asset_id));
        Ok(())
    }

    async fn assets_held_by(&mut self, worker_id: Uuid) -> AppResult<Vec<Asset>> {
        let mut held: Vec<Asset> = self
            .working
            .assets
            .values()
            .filter(|a| a.current_holder_id == Some(worker_id))
            .cloned()
            .collect();
        held.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(held)
    }

    async fn open_assignment(&mut self, asset_id: Uuid) -> AppResult<Option<AssetAssignment>> {
        Ok(self
            .working
            .assignments
            .iter()
            .find(|a| a.asset_id == asset_id && a.is_open())
            .cloned())
    }

    async fn assignment_closed_by(
        &mut self,
        asset_id: Uuid,
        movement_id: Uuid,
    ) -> AppResult<Option<AssetAssignment>> {
        Ok(self
            .working
            .assignments
            .iter()
            .find(|a| a.asset_id == asset_id && a.closed_by_movement_id == Some(movement_id))
            .cloned())
    }

    async fn insert_assignment(&mut self, assignment: &AssetAssignment) -> AppResult<()> {
        self.working.assignments.push(assignment.clone());
        Ok(())
    }

    async fn save_assignment(&mut self, assignment: &AssetAssignment) -> AppResult<()> {
        if let Some(existing) = self
            .working
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment.id)
        {
            *existing = assignment.clone();
        }
        Ok(())
    }

    async fn delete_assignments_opened_by(&mut self, movement_id: Uuid) -> AppResult<()> {
        self.working
            .assignments
            .retain(|a| a.movement_id != Some(movement_id));
        Ok(())
    }

    async fn insert_ppe_delivery(&mut self, delivery: &PpeDelivery) -> AppResult<()> {
        self.working.ppe_deliveries.push(delivery.clone());
        Ok(())
    }

    async fn delete_ppe_deliveries(&mut self, movement_id: Uuid) -> AppResult<()> {
        self.working
            .ppe_deliveries
            .retain(|d| d.movement_id != movement_id);
        Ok(())
    }

    async fn ppe_deliveries_for(&mut self, worker_id: Uuid) -> AppResult<Vec<PpeDelivery>> {
        Ok(self
            .working
            .ppe_deliveries
            .iter()
            .filter(|d| d.worker_id == worker_id)
            .cloned()
            .collect())
    }
}
