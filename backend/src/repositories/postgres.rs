//! PostgreSQL ledger store
//!
//! Each [`PgTx`] wraps one database transaction with a bounded lock wait.
//! Row locks are taken with `SELECT ... FOR UPDATE`; rows that are created
//! lazily (stock, existence) are upserted first so the lock always has a
//! target.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    Asset, AssetAssignment, AssetSnapshot, Existence, Kit, Material, Movement, MovementLine,
    PpeDelivery, Project, Requisition, RequisitionLine, Stock, Warehouse, Worker,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    AssetRepository, CatalogRepository, ExistenceRepository, LedgerStore, LedgerTx,
    MovementRepository, Reservation, RequisitionRepository, StockRepository,
};
use crate::error::{AppError, AppResult};

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
    lock_timeout: Duration,
}

impl PgLedgerStore {
    pub fn new(db: PgPool, lock_timeout: Duration) -> Self {
        Self { db, lock_timeout }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let mut tx = self.db.begin().await?;

        // SET does not take bind parameters
        let statement = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&statement).execute(&mut *tx).await?;

        Ok(Box::new(PgTx { tx }))
    }
}

/// One PostgreSQL transaction
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: Uuid,
    code: String,
    name: String,
    uses_cost_control: bool,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct WarehouseRow {
    id: Uuid,
    project_id: Uuid,
    code: String,
    name: String,
    is_primary: bool,
    location: Option<String>,
}

#[derive(Debug, FromRow)]
struct MaterialRow {
    id: Uuid,
    code: String,
    description: String,
    unit_of_measure: String,
    kind: String,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct WorkerRow {
    id: Uuid,
    dni: String,
    first_names: String,
    last_names: String,
    position: Option<String>,
    is_active: bool,
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    project_id: Uuid,
    movement_type: String,
    status: String,
    moved_at: DateTime<Utc>,
    reference_document: String,
    entry_note: Option<String>,
    requisition_id: Option<Uuid>,
    source_warehouse_id: Option<Uuid>,
    destination_warehouse_id: Option<Uuid>,
    tower_id: Option<Uuid>,
    worker_id: Option<Uuid>,
    notes: String,
}

#[derive(Debug, FromRow)]
struct MovementLineRow {
    id: Uuid,
    movement_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
    unit_cost: Decimal,
    serials: Option<String>,
    asset_id: Option<Uuid>,
    requisition_id: Option<Uuid>,
    resolved_requisition_id: Option<Uuid>,
    is_free_stock: bool,
    prior_asset_state: Option<String>,
    prior_asset_location_id: Option<Uuid>,
    prior_asset_holder_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct StockRow {
    warehouse_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
    minimum_quantity: Decimal,
    aisle_location: Option<String>,
}

#[derive(Debug, FromRow)]
struct ExistenceRow {
    project_id: Uuid,
    material_id: Uuid,
    average_cost: Decimal,
    last_purchase_cost: Decimal,
    total_project_quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct RequisitionRow {
    id: Uuid,
    project_id: Uuid,
    code: String,
    requester: String,
    requested_on: NaiveDate,
    needed_by: Option<NaiveDate>,
    priority: String,
    status: String,
    closed_manually: bool,
    notes: String,
}

#[derive(Debug, FromRow)]
struct RequisitionLineRow {
    id: Uuid,
    requisition_id: Uuid,
    material_id: Uuid,
    requested_qty: Decimal,
    received_qty: Decimal,
    fulfilled_qty: Decimal,
}

#[derive(Debug, FromRow)]
struct AssetRow {
    id: Uuid,
    code: String,
    material_id: Uuid,
    serial: String,
    state: String,
    location_id: Option<Uuid>,
    current_holder_id: Option<Uuid>,
    origin_movement_id: Option<Uuid>,
    kit_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    asset_id: Uuid,
    worker_id: Uuid,
    assigned_at: DateTime<Utc>,
    returned_at: Option<DateTime<Utc>>,
    notes: String,
    movement_id: Option<Uuid>,
    closed_by_movement_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct PpeDeliveryRow {
    id: Uuid,
    worker_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
    movement_id: Uuid,
    delivered_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct KitRow {
    id: Uuid,
    code: String,
    name: String,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            code: row.code,
            name: row.name,
            uses_cost_control: row.uses_cost_control,
            is_active: row.is_active,
        }
    }
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            project_id: row.project_id,
            code: row.code,
            name: row.name,
            is_primary: row.is_primary,
            location: row.location,
        }
    }
}

impl TryFrom<MaterialRow> for Material {
    type Error = AppError;

    fn try_from(row: MaterialRow) -> AppResult<Self> {
        Ok(Material {
            id: row.id,
            code: row.code,
            description: row.description,
            unit_of_measure: row.unit_of_measure,
            kind: row.kind.parse()?,
            is_active: row.is_active,
        })
    }
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Worker {
            id: row.id,
            dni: row.dni,
            first_names: row.first_names,
            last_names: row.last_names,
            position: row.position,
            is_active: row.is_active,
        }
    }
}

impl TryFrom<MovementLineRow> for MovementLine {
    type Error = AppError;

    fn try_from(row: MovementLineRow) -> AppResult<Self> {
        let prior_asset = match row.prior_asset_state {
            Some(state) => Some(AssetSnapshot {
                state: state.parse()?,
                location_id: row.prior_asset_location_id,
                holder_id: row.prior_asset_holder_id,
            }),
            None => None,
        };

        Ok(MovementLine {
            id: row.id,
            movement_id: row.movement_id,
            material_id: row.material_id,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            serials: row.serials,
            asset_id: row.asset_id,
            requisition_id: row.requisition_id,
            resolved_requisition_id: row.resolved_requisition_id,
            is_free_stock: row.is_free_stock,
            prior_asset,
        })
    }
}

impl From<StockRow> for Stock {
    fn from(row: StockRow) -> Self {
        Stock {
            warehouse_id: row.warehouse_id,
            material_id: row.material_id,
            quantity: row.quantity,
            minimum_quantity: row.minimum_quantity,
            aisle_location: row.aisle_location,
        }
    }
}

impl From<ExistenceRow> for Existence {
    fn from(row: ExistenceRow) -> Self {
        Existence {
            project_id: row.project_id,
            material_id: row.material_id,
            average_cost: row.average_cost,
            last_purchase_cost: row.last_purchase_cost,
            total_project_quantity: row.total_project_quantity,
        }
    }
}

impl From<RequisitionLineRow> for RequisitionLine {
    fn from(row: RequisitionLineRow) -> Self {
        RequisitionLine {
            id: row.id,
            requisition_id: row.requisition_id,
            material_id: row.material_id,
            requested_qty: row.requested_qty,
            received_qty: row.received_qty,
            fulfilled_qty: row.fulfilled_qty,
        }
    }
}

impl TryFrom<AssetRow> for Asset {
    type Error = AppError;

    fn try_from(row: AssetRow) -> AppResult<Self> {
        Ok(Asset {
            id: row.id,
            code: row.code,
            material_id: row.material_id,
            serial: row.serial,
            state: row.state.parse()?,
            location_id: row.location_id,
            current_holder_id: row.current_holder_id,
            origin_movement_id: row.origin_movement_id,
            kit_id: row.kit_id,
        })
    }
}

impl From<AssignmentRow> for AssetAssignment {
    fn from(row: AssignmentRow) -> Self {
        AssetAssignment {
            id: row.id,
            asset_id: row.asset_id,
            worker_id: row.worker_id,
            assigned_at: row.assigned_at,
            returned_at: row.returned_at,
            notes: row.notes,
            movement_id: row.movement_id,
            closed_by_movement_id: row.closed_by_movement_id,
        }
    }
}

impl From<PpeDeliveryRow> for PpeDelivery {
    fn from(row: PpeDeliveryRow) -> Self {
        PpeDelivery {
            id: row.id,
            worker_id: row.worker_id,
            material_id: row.material_id,
            quantity: row.quantity,
            movement_id: row.movement_id,
            delivered_at: row.delivered_at,
        }
    }
}

impl From<KitRow> for Kit {
    fn from(row: KitRow) -> Self {
        Kit {
            id: row.id,
            code: row.code,
            name: row.name,
        }
    }
}

fn collect_assets(rows: Vec<AssetRow>) -> AppResult<Vec<Asset>> {
    rows.into_iter().map(Asset::try_from).collect()
}

const MOVEMENT_COLUMNS: &str = "id, project_id, movement_type, status, moved_at, \
    reference_document, entry_note, requisition_id, source_warehouse_id, \
    destination_warehouse_id, tower_id, worker_id, notes";

const ASSET_COLUMNS: &str = "id, code, material_id, serial, state, location_id, \
    current_holder_id, origin_movement_id, kit_id";

const REQUISITION_COLUMNS: &str =
    "id, project_id, code, requester, requested_on, needed_by, priority, status, \
    closed_manually, notes";

const ASSIGNMENT_COLUMNS: &str = "id, asset_id, worker_id, assigned_at, returned_at, notes, \
    movement_id, closed_by_movement_id";

impl PgTx {
    async fn load_movement(&mut self, row: MovementRow) -> AppResult<Movement> {
        let lines = sqlx::query_as::<_, MovementLineRow>(
            r#"
            SELECT id, movement_id, material_id, quantity, unit_cost, serials, asset_id,
                   requisition_id, resolved_requisition_id, is_free_stock,
                   prior_asset_state, prior_asset_location_id, prior_asset_holder_id
            FROM movement_lines
            WHERE movement_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(MovementLine::try_from)
        .collect::<AppResult<Vec<_>>>()?;

        Ok(Movement {
            id: row.id,
            project_id: row.project_id,
            movement_type: row.movement_type.parse()?,
            status: row.status.parse()?,
            moved_at: row.moved_at,
            reference_document: row.reference_document,
            entry_note: row.entry_note,
            requisition_id: row.requisition_id,
            source_warehouse_id: row.source_warehouse_id,
            destination_warehouse_id: row.destination_warehouse_id,
            tower_id: row.tower_id,
            worker_id: row.worker_id,
            notes: row.notes,
            lines,
        })
    }

    async fn load_requisition(&mut self, row: RequisitionRow) -> AppResult<Requisition> {
        let lines = sqlx::query_as::<_, RequisitionLineRow>(
            r#"
            SELECT id, requisition_id, material_id, requested_qty, received_qty, fulfilled_qty
            FROM requisition_lines
            WHERE requisition_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(RequisitionLine::from)
        .collect();

        Ok(Requisition {
            id: row.id,
            project_id: row.project_id,
            code: row.code,
            requester: row.requester,
            requested_on: row.requested_on,
            needed_by: row.needed_by,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            closed_manually: row.closed_manually,
            notes: row.notes,
            lines,
        })
    }

    async fn fetch_requisition(&mut self, id: Uuid, lock: bool) -> AppResult<Option<Requisition>> {
        let sql = format!(
            "SELECT {} FROM requisitions WHERE id = $1{}",
            REQUISITION_COLUMNS,
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query_as::<_, RequisitionRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_requisition(row).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_movement(&mut self, id: Uuid, lock: bool) -> AppResult<Option<Movement>> {
        let sql = format!(
            "SELECT {} FROM movements WHERE id = $1{}",
            MOVEMENT_COLUMNS,
            if lock { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_movement(row).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_asset(&mut self, id: Uuid, lock: bool) -> AppResult<Option<Asset>> {
        let sql = format!(
            "SELECT {} FROM assets WHERE id = $1{}",
            ASSET_COLUMNS,
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, AssetRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Asset::try_from)
            .transpose()
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[async_trait]
impl CatalogRepository for PgTx {
    async fn get_project(&mut self, id: Uuid) -> AppResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, code, name, uses_cost_control, is_active FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Project::from))
    }

    async fn get_warehouse(&mut self, id: Uuid) -> AppResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, project_id, code, name, is_primary, location FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Warehouse::from))
    }

    async fn get_material(&mut self, id: Uuid) -> AppResult<Option<Material>> {
        sqlx::query_as::<_, MaterialRow>(
            r#"
            SELECT id, code, description, unit_of_measure, kind, is_active
            FROM materials
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Material::try_from)
        .transpose()
    }

    async fn get_worker(&mut self, id: Uuid) -> AppResult<Option<Worker>> {
        let row = sqlx::query_as::<_, WorkerRow>(
            r#"
            SELECT id, dni, first_names, last_names, position, is_active
            FROM workers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Worker::from))
    }
}

// ============================================================================
// Movements
// ============================================================================

#[async_trait]
impl MovementRepository for PgTx {
    async fn find_movement(&mut self, id: Uuid) -> AppResult<Option<Movement>> {
        self.fetch_movement(id, false).await
    }

    async fn lock_movement(&mut self, id: Uuid) -> AppResult<Option<Movement>> {
        self.fetch_movement(id, true).await
    }

    async fn insert_movement(&mut self, movement: &Movement) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO movements (
                id, project_id, movement_type, status, moved_at, reference_document,
                entry_note, requisition_id, source_warehouse_id, destination_warehouse_id,
                tower_id, worker_id, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(movement.id)
        .bind(movement.project_id)
        .bind(movement.movement_type.as_str())
        .bind(movement.status.as_str())
        .bind(movement.moved_at)
        .bind(&movement.reference_document)
        .bind(&movement.entry_note)
        .bind(movement.requisition_id)
        .bind(movement.source_warehouse_id)
        .bind(movement.destination_warehouse_id)
        .bind(movement.tower_id)
        .bind(movement.worker_id)
        .bind(&movement.notes)
        .execute(&mut *self.tx)
        .await?;

        for (line_no, line) in movement.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO movement_lines (
                    id, movement_id, line_no, material_id, quantity, unit_cost, serials,
                    asset_id, requisition_id, is_free_stock
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(line.id)
            .bind(movement.id)
            .bind(line_no as i32)
            .bind(line.material_id)
            .bind(line.quantity)
            .bind(line.unit_cost)
            .bind(&line.serials)
            .bind(line.asset_id)
            .bind(line.requisition_id)
            .bind(line.is_free_stock)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn save_movement(&mut self, movement: &Movement) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE movements
            SET status = $2, entry_note = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(movement.id)
        .bind(movement.status.as_str())
        .bind(&movement.entry_note)
        .execute(&mut *self.tx)
        .await?;

        for line in &movement.lines {
            let prior = line.prior_asset;
            sqlx::query(
                r#"
                UPDATE movement_lines
                SET unit_cost = $2,
                    resolved_requisition_id = $3,
                    prior_asset_state = $4,
                    prior_asset_location_id = $5,
                    prior_asset_holder_id = $6
                WHERE id = $1
                "#,
            )
            .bind(line.id)
            .bind(line.unit_cost)
            .bind(line.resolved_requisition_id)
            .bind(prior.map(|p| p.state.as_str()))
            .bind(prior.and_then(|p| p.location_id))
            .bind(prior.and_then(|p| p.holder_id))
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn next_entry_note_sequence(&mut self, project_id: Uuid) -> AppResult<i64> {
        let (value,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO entry_note_sequences (project_id, last_value)
            VALUES ($1, 1)
            ON CONFLICT (project_id)
            DO UPDATE SET last_value = entry_note_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(project_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(value)
    }
}

// ============================================================================
// Stock and existences
// ============================================================================

#[async_trait]
impl StockRepository for PgTx {
    async fn lock_stock(&mut self, warehouse_id: Uuid, material_id: Uuid) -> AppResult<Stock> {
        sqlx::query(
            r#"
            INSERT INTO stocks (warehouse_id, material_id)
            VALUES ($1, $2)
            ON CONFLICT (warehouse_id, material_id) DO NOTHING
            "#,
        )
        .bind(warehouse_id)
        .bind(material_id)
        .execute(&mut *self.tx)
        .await?;

        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT warehouse_id, material_id, quantity, minimum_quantity, aisle_location
            FROM stocks
            WHERE warehouse_id = $1 AND material_id = $2
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(material_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn save_stock(&mut self, stock: &Stock) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE stocks
            SET quantity = $3, updated_at = NOW()
            WHERE warehouse_id = $1 AND material_id = $2
            "#,
        )
        .bind(stock.warehouse_id)
        .bind(stock.material_id)
        .bind(stock.quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_stock(
        &mut self,
        warehouse_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Stock>> {
        let row = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT warehouse_id, material_id, quantity, minimum_quantity, aisle_location
            FROM stocks
            WHERE warehouse_id = $1 AND material_id = $2
            "#,
        )
        .bind(warehouse_id)
        .bind(material_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Stock::from))
    }

    async fn stocks_in_warehouse(&mut self, warehouse_id: Uuid) -> AppResult<Vec<Stock>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT s.warehouse_id, s.material_id, s.quantity, s.minimum_quantity, s.aisle_location
            FROM stocks s
            JOIN materials m ON m.id = s.material_id
            WHERE s.warehouse_id = $1
            ORDER BY m.code
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(Stock::from).collect())
    }
}

#[async_trait]
impl ExistenceRepository for PgTx {
    async fn lock_existence(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Existence> {
        sqlx::query(
            r#"
            INSERT INTO existences (project_id, material_id)
            VALUES ($1, $2)
            ON CONFLICT (project_id, material_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(material_id)
        .execute(&mut *self.tx)
        .await?;

        let row = sqlx::query_as::<_, ExistenceRow>(
            r#"
            SELECT project_id, material_id, average_cost, last_purchase_cost, total_project_quantity
            FROM existences
            WHERE project_id = $1 AND material_id = $2
            FOR UPDATE
            "#,
        )
        .bind(project_id)
        .bind(material_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn save_existence(&mut self, existence: &Existence) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE existences
            SET average_cost = $3,
                last_purchase_cost = $4,
                total_project_quantity = $5,
                updated_at = NOW()
            WHERE project_id = $1 AND material_id = $2
            "#,
        )
        .bind(existence.project_id)
        .bind(existence.material_id)
        .bind(existence.average_cost)
        .bind(existence.last_purchase_cost)
        .bind(existence.total_project_quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_existence(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Existence>> {
        let row = sqlx::query_as::<_, ExistenceRow>(
            r#"
            SELECT project_id, material_id, average_cost, last_purchase_cost, total_project_quantity
            FROM existences
            WHERE project_id = $1 AND material_id = $2
            "#,
        )
        .bind(project_id)
        .bind(material_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Existence::from))
    }
}

// ============================================================================
// Requisitions
// ============================================================================

#[async_trait]
impl RequisitionRepository for PgTx {
    async fn find_requisition(&mut self, id: Uuid) -> AppResult<Option<Requisition>> {
        self.fetch_requisition(id, false).await
    }

    async fn lock_requisition(&mut self, id: Uuid) -> AppResult<Option<Requisition>> {
        self.fetch_requisition(id, true).await
    }

    async fn lock_fifo_requisition(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Option<Requisition>> {
        let row = sqlx::query_as::<_, RequisitionRow>(
            r#"
            SELECT r.id, r.project_id, r.code, r.requester, r.requested_on, r.needed_by,
                   r.priority, r.status, r.notes
            FROM requisitions r
            JOIN requisition_lines l ON l.requisition_id = r.id
            WHERE r.project_id = $1
              AND l.material_id = $2
              AND r.status IN ('pending', 'partial')
              AND l.requested_qty > l.received_qty
            ORDER BY r.requested_on, r.code
            LIMIT 1
            FOR UPDATE OF r
            "#,
        )
        .bind(project_id)
        .bind(material_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_requisition(row).await?)),
            None => Ok(None),
        }
    }

    async fn open_reservations(
        &mut self,
        project_id: Uuid,
        material_id: Uuid,
    ) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT r.id AS requisition_id,
                   r.code AS requisition_code,
                   l.received_qty - l.fulfilled_qty AS quantity
            FROM requisition_lines l
            JOIN requisitions r ON r.id = l.requisition_id
            WHERE r.project_id = $1
              AND l.material_id = $2
              AND r.status IN ('pending', 'partial')
              AND l.received_qty > l.fulfilled_qty
            ORDER BY r.requested_on, r.code
            "#,
        )
        .bind(project_id)
        .bind(material_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(reservations)
    }

    async fn save_requisition(&mut self, requisition: &Requisition) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE requisitions
            SET status = $2, closed_manually = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(requisition.id)
        .bind(requisition.status.as_str())
        .bind(requisition.closed_manually)
        .execute(&mut *self.tx)
        .await?;

        for line in &requisition.lines {
            sqlx::query(
                r#"
                UPDATE requisition_lines
                SET received_qty = $2, fulfilled_qty = $3
                WHERE id = $1
                "#,
            )
            .bind(line.id)
            .bind(line.received_qty)
            .bind(line.fulfilled_qty)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }
}

// ============================================================================
// Assets and PPE
// ============================================================================

#[async_trait]
impl AssetRepository for PgTx {
    async fn find_asset(&mut self, id: Uuid) -> AppResult<Option<Asset>> {
        self.fetch_asset(id, false).await
    }

    async fn lock_asset(&mut self, id: Uuid) -> AppResult<Option<Asset>> {
        self.fetch_asset(id, true).await
    }

    async fn lock_kit_assets(&mut self, kit_id: Uuid) -> AppResult<Vec<Asset>> {
        let sql = format!(
            "SELECT {} FROM assets WHERE kit_id = $1 ORDER BY id FOR UPDATE",
            ASSET_COLUMNS
        );
        let rows = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(kit_id)
            .fetch_all(&mut *self.tx)
            .await?;

        collect_assets(rows)
    }

    async fn find_kit(&mut self, id: Uuid) -> AppResult<Option<Kit>> {
        let row = sqlx::query_as::<_, KitRow>("SELECT id, code, name FROM kits WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(Kit::from))
    }

    async fn serial_exists(&mut self, serial: &str) -> AppResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM assets WHERE serial = $1)")
                .bind(serial)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn insert_asset(&mut self, asset: &Asset) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO assets (
                id, code, material_id, serial, state, location_id,
                current_holder_id, origin_movement_id, kit_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(asset.id)
        .bind(&asset.code)
        .bind(asset.material_id)
        .bind(&asset.serial)
        .bind(asset.state.as_str())
        .bind(asset.location_id)
        .bind(asset.current_holder_id)
        .bind(asset.origin_movement_id)
        .bind(asset.kit_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn save_asset(&mut self, asset: &Asset) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE assets
            SET state = $2, location_id = $3, current_holder_id = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(asset.id)
        .bind(asset.state.as_str())
        .bind(asset.location_id)
        .bind(asset.current_holder_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn lock_assets_by_origin(&mut self, movement_id: Uuid) -> AppResult<Vec<Asset>> {
        let sql = format!(
            "SELECT {} FROM assets WHERE origin_movement_id = $1 ORDER BY id FOR UPDATE",
            ASSET_COLUMNS
        );
        let rows = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(movement_id)
            .fetch_all(&mut *self.tx)
            .await?;

        collect_assets(rows)
    }

    async fn delete_assets_by_origin(&mut self, movement_id: Uuid) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM asset_assignments
            WHERE asset_id IN (SELECT id FROM assets WHERE origin_movement_id = $1)
            "#,
        )
        .bind(movement_id)
        .execute(&mut *self.tx)
        .await?;

        sqlx::query("DELETE FROM assets WHERE origin_movement_id = $1")
            .bind(movement_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn assets_held_by(&mut self, worker_id: Uuid) -> AppResult<Vec<Asset>> {
        let sql = format!(
            "SELECT {} FROM assets WHERE current_holder_id = $1 ORDER BY code",
            ASSET_COLUMNS
        );
        let rows = sqlx::query_as::<_, AssetRow>(&sql)
            .bind(worker_id)
            .fetch_all(&mut *self.tx)
            .await?;

        collect_assets(rows)
    }

    async fn open_assignment(&mut self, asset_id: Uuid) -> AppResult<Option<AssetAssignment>> {
        let sql = format!(
            "SELECT {} FROM asset_assignments \
             WHERE asset_id = $1 AND returned_at IS NULL \
             ORDER BY assigned_at DESC LIMIT 1",
            ASSIGNMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(asset_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(AssetAssignment::from))
    }

    async fn assignment_closed_by(
        &mut self,
        asset_id: Uuid,
        movement_id: Uuid,
    ) -> AppResult<Option<AssetAssignment>> {
        let sql = format!(
            "SELECT {} FROM asset_assignments \
             WHERE asset_id = $1 AND closed_by_movement_id = $2",
            ASSIGNMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, AssignmentRow>(&sql)
            .bind(asset_id)
            .bind(movement_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(row.map(AssetAssignment::from))
    }

    async fn insert_assignment(&mut self, assignment: &AssetAssignment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO asset_assignments (
                id, asset_id, worker_id, assigned_at, returned_at, notes,
                movement_id, closed_by_movement_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.asset_id)
        .bind(assignment.worker_id)
        .bind(assignment.assigned_at)
        .bind(assignment.returned_at)
        .bind(&assignment.notes)
        .bind(assignment.movement_id)
        .bind(assignment.closed_by_movement_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn save_assignment(&mut self, assignment: &AssetAssignment) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE asset_assignments
            SET returned_at = $2, closed_by_movement_id = $3, notes = $4
            WHERE id = $1
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.returned_at)
        .bind(assignment.closed_by_movement_id)
        .bind(&assignment.notes)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_assignments_opened_by(&mut self, movement_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM asset_assignments WHERE movement_id = $1")
            .bind(movement_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_ppe_delivery(&mut self, delivery: &PpeDelivery) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ppe_deliveries (id, worker_id, material_id, quantity, movement_id, delivered_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(delivery.id)
        .bind(delivery.worker_id)
        .bind(delivery.material_id)
        .bind(delivery.quantity)
        .bind(delivery.movement_id)
        .bind(delivery.delivered_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_ppe_deliveries(&mut self, movement_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM ppe_deliveries WHERE movement_id = $1")
            .bind(movement_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn ppe_deliveries_for(&mut self, worker_id: Uuid) -> AppResult<Vec<PpeDelivery>> {
        let rows = sqlx::query_as::<_, PpeDeliveryRow>(
            r#"
            SELECT id, worker_id, material_id, quantity, movement_id, delivered_at
            FROM ppe_deliveries
            WHERE worker_id = $1
            ORDER BY delivered_at DESC
            "#,
        )
        .bind(worker_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(PpeDelivery::from).collect())
    }
}
