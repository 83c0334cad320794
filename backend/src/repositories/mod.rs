//! Repository interfaces for the ledger stores
//!
//! Every ledger operation runs inside one [`LedgerTx`] started from a
//! [`LedgerStore`]. The `lock_*` methods take a row lock (or its in-memory
//! equivalent) that is held until the transaction commits or rolls back.
//! Callers must lock existences and stocks in ascending material id order.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    Asset, AssetAssignment, Existence, Kit, Material, Movement, PpeDelivery, Project, Requisition,
    Stock, Warehouse, Worker,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Reserved quantity of one open requisition for a material
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Reservation {
    pub requisition_id: Uuid,
    pub requisition_code: String,
    /// Received but not yet handed over
    pub quantity: Decimal,
}

/// Read access to master data owned by other systems
#[async_trait]
pub trait CatalogRepository: Send {
    async fn get_project(&mut self, id: Uuid) -> AppResult<Option<Project>>;

    async fn get_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>>;

    async fn get_material(&mut self, id: Uuid) -> AppResult<Option<Material>>;

    async fn get_worker(&mut self, id: Uuid) -> AppResult<Option<Worker>>;
}

#[async_trait]
pub trait MovementRepository: Send {
    async fn find_movement(&mut self, id: Uuid) -> AppResult<Option<Movement>>;

    /// Movement header locked for update, with its lines
    async fn lock_movement(&mut self, id: Uuid) -> AppResult<Option<Movement>>;

    async fn insert_movement(&mut self, movement: &Movement) -> AppResult<()>;

    /// Persists the header status and the fields confirm writes on each line
    async fn save_movement(&mut self, movement: &Movement) -> AppResult<()>;

    /// Next entry-note number for purchases of a project
    async fn next_entry_note_sequence(&mut self, project_id: Uuid) -> AppResult<i64>;
}

#[async_trait]
pub trait StockRepository: Send {
    /// Locks the stock row, creating an empty one when missing
    async fn lock_stock(&mut self, warehouse_id: Uuid, material_id: Uuid) -> AppResult<Stock>;

    async fn save_stock(&mut self, stock: &Stock) -> AppResult<()>;

    async fn find_stock(&mut self, warehouse_id: Uuid, material_id: Uuid)
        -> AppResult<Option<Stock>>;

    async fn stocks_in_warehouse(&mut self, warehouse_id: Uuid) -> AppResult<Vec<Stock>>;
}

#[async_trait]
pub trait ExistenceRepository: Send {
    /// Locks the existence row, creating an empty one when missing
    async fn lock_existence(&mut self, project_id: Uuid, material_id: Uuid)
        -> AppResult<Existence>;

    async fn save_existence(&mut self, existence: &Existence) -> AppResult<()>;

    async fn find_existence(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Existence>>;
}

#[async_trait]
pub trait RequisitionRepository: Send {
    async fn find_requisition(&mut self, id: Uuid) -> AppResult<Option<Requisition>>;

    async fn lock_requisition(&mut self, id: Uuid) -> AppResult<Option<Requisition>>;

    /// Oldest open requisition of the project still expecting the material, locked
    async fn lock_fifo_requisition(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Requisition>>;

    /// Positive reservations of open requisitions, oldest first
    async fn open_reservations(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Vec<Reservation>>;

    /// Persists status and line counters
    async fn save_requisition(&mut self, requisition: &Requisition) -> AppResult<()>;
}

#[async_trait]
pub trait AssetRepository: Send {
    async fn find_asset(&mut self, id: Uuid) -> AppResult<Option<Asset>>;

    async fn lock_asset(&mut self, id: Uuid) -> AppResult<Option<Asset>>;

    /// Members of a kit locked in id order
    async fn lock_kit_assets(&mut self, kit_id: Uuid) -> AppResult<Vec<Asset>>;

    async fn find_kit(&mut self, id: Uuid) -> AppResult<Option<Kit>>;

    async fn serial_exists(&mut self, serial: &str) -> AppResult<bool>;

    async fn insert_asset(&mut self, asset: &Asset) -> AppResult<()>;

    async fn save_asset(&mut self, asset: &Asset) -> AppResult<()>;

    /// Assets created by a purchase movement, locked
    async fn lock_assets_by_origin(&mut self, movement_id: Uuid) -> AppResult<Vec<Asset>>;

    async fn delete_assets_by_origin(&mut self, movement_id: Uuid) -> AppResult<()>;

    async fn assets_held_by(&mut self, worker_id: Uuid) -> AppResult<Vec<Asset>>;

    async fn open_assignment(&mut self, asset_id: Uuid) -> AppResult<Option<AssetAssignment>>;

    /// Assignment of an asset that a given movement closed
    async fn assignment_closed_by(
        &mut self,
        asset_id: Uuid,
        movement_id: Uuid,
    ) -> AppResult<Option<AssetAssignment>>;

    async fn insert_assignment(&mut self, assignment: &AssetAssignment) -> AppResult<()>;

    async fn save_assignment(&mut self, assignment: &AssetAssignment) -> AppResult<()>;

    /// Removes assignments a movement opened
    async fn delete_assignments_opened_by(&mut self, movement_id: Uuid) -> AppResult<()>;

    async fn insert_ppe_delivery(&mut self, delivery: &PpeDelivery) -> AppResult<()>;

    async fn delete_ppe_deliveries(&mut self, movement_id: Uuid) -> AppResult<()>;

    async fn ppe_deliveries_for(&mut self, worker_id: Uuid) -> AppResult<Vec<PpeDelivery>>;
}

/// One atomic unit of work over every ledger store
#[async_trait]
pub trait LedgerTx:
    CatalogRepository
    + MovementRepository
    + StockRepository
    + ExistenceRepository
    + RequisitionRepository
    + AssetRepository
    + Send
{
    /// Persist every change made through this transaction
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Discard every change made through this transaction
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Starts ledger transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;
}
