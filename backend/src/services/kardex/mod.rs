//! Kardex engine: confirmation and reversal of movements
//!
//! A confirm walks every line of a draft movement and keeps four stores in
//! step inside one transaction: warehouse stock, the project-wide existence
//! card (quantity and weighted-average cost), requisition counters and the
//! fixed-asset registry. Reverse applies the inverse effects line by line.
//!
//! Existence rows are locked for every distinct material in ascending id
//! order before any line is touched, then the stock rows of the affected
//! warehouse in the same order, then explicitly linked requisitions by id.
//! FIFO matches are locked as each line finds them.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    Direction, Existence, Material, Movement, MovementLine, MovementStatus, Project, Stock,
    Worker,
};
use uuid::Uuid;

use crate::config::KardexConfig;
use crate::error::{AppError, AppResult};
use crate::repositories::{LedgerStore, LedgerTx};
use crate::services::finish;

mod asset_moves;
mod reconcile;
mod reservation;

/// The accounting engine behind confirm and reverse
#[derive(Clone)]
pub struct KardexService {
    store: Arc<dyn LedgerStore>,
    config: KardexConfig,
}

/// Header facts every line of a movement is processed against
pub(crate) struct Scope {
    pub project: Project,
    pub direction: Direction,
    /// Warehouse whose stock changes
    pub warehouse_id: Uuid,
    pub worker: Option<Worker>,
    pub materials: HashMap<Uuid, Material>,
}

impl Scope {
    pub fn material(&self, id: Uuid) -> AppResult<&Material> {
        self.materials
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Material {}", id)))
    }

    fn cost_control(&self) -> bool {
        self.project.uses_cost_control
    }
}

/// Existence and stock rows held under lock for one movement
pub(crate) struct LockedRows {
    existences: HashMap<Uuid, Existence>,
    stocks: HashMap<Uuid, Stock>,
}

impl LockedRows {
    async fn acquire(
        tx: &mut dyn LedgerTx,
        project_id: Uuid,
        warehouse_id: Uuid,
        material_ids: &[Uuid],
    ) -> AppResult<Self> {
        let mut existences = HashMap::new();
        for &material_id in material_ids {
            let existence = tx.lock_existence(project_id, material_id).await?;
            existences.insert(material_id, existence);
        }

        let mut stocks = HashMap::new();
        for &material_id in material_ids {
            let stock = tx.lock_stock(warehouse_id, material_id).await?;
            stocks.insert(material_id, stock);
        }

        Ok(Self { existences, stocks })
    }

    fn pair_mut(&mut self, material_id: Uuid) -> AppResult<(&mut Stock, &mut Existence)> {
        let stock = self.stocks.get_mut(&material_id);
        let existence = self.existences.get_mut(&material_id);
        match (stock, existence) {
            (Some(stock), Some(existence)) => Ok((stock, existence)),
            _ => Err(AppError::Internal(format!(
                "material {} was not locked for this movement",
                material_id
            ))),
        }
    }
}

impl KardexService {
    pub fn new(store: Arc<dyn LedgerStore>, config: KardexConfig) -> Self {
        Self { store, config }
    }

    /// Apply a draft movement to the ledger
    pub async fn confirm(&self, movement_id: Uuid) -> AppResult<Movement> {
        let mut tx = self.store.begin().await?;
        let result = self.confirm_in(&mut *tx, movement_id).await;
        let movement = finish(tx, result).await?;

        tracing::info!(
            movement_id = %movement.id,
            movement_type = movement.movement_type.as_str(),
            lines = movement.lines.len(),
            "Movement confirmed"
        );
        Ok(movement)
    }

    /// Cancel a movement, undoing its effects when it was confirmed
    pub async fn reverse(&self, movement_id: Uuid) -> AppResult<Movement> {
        let mut tx = self.store.begin().await?;
        let result = self.reverse_in(&mut *tx, movement_id).await;
        let movement = finish(tx, result).await?;

        tracing::info!(
            movement_id = %movement.id,
            movement_type = movement.movement_type.as_str(),
            "Movement cancelled"
        );
        Ok(movement)
    }

    async fn confirm_in(&self, tx: &mut dyn LedgerTx, movement_id: Uuid) -> AppResult<Movement> {
        let mut movement = tx
            .lock_movement(movement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        if movement.status != MovementStatus::Draft {
            return Err(AppError::InvalidState(format!(
                "only draft movements can be confirmed; {} is {}",
                movement.visual_code(),
                movement.status.as_str()
            )));
        }
        if movement.lines.is_empty() {
            return Err(AppError::InvalidState(format!(
                "{} has no lines",
                movement.visual_code()
            )));
        }

        let scope = self.confirm_scope(tx, &movement).await?;
        let material_ids = movement.material_ids();
        let mut rows =
            LockedRows::acquire(tx, scope.project.id, scope.warehouse_id, &material_ids).await?;
        reconcile::lock_in_order(tx, &movement.linked_requisition_ids()).await?;

        let mut lines = std::mem::take(&mut movement.lines);
        for line in &mut lines {
            match scope.direction {
                Direction::Inbound => {
                    self.confirm_inbound(tx, &movement, &scope, &mut rows, line)
                        .await?
                }
                Direction::Outbound => {
                    self.confirm_outbound(tx, &movement, &scope, &mut rows, line)
                        .await?
                }
            }
        }
        movement.lines = lines;

        movement.status = MovementStatus::Confirmed;
        tx.save_movement(&movement).await?;
        Ok(movement)
    }

    async fn reverse_in(&self, tx: &mut dyn LedgerTx, movement_id: Uuid) -> AppResult<Movement> {
        let mut movement = tx
            .lock_movement(movement_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        match movement.status {
            MovementStatus::Cancelled => {
                return Err(AppError::AlreadyCancelled(movement.visual_code()));
            }
            MovementStatus::Draft => {
                movement.status = MovementStatus::Cancelled;
                tx.save_movement(&movement).await?;
                return Ok(movement);
            }
            MovementStatus::Confirmed => {}
        }

        let scope = self.reverse_scope(tx, &movement).await?;
        let material_ids = movement.material_ids();
        let mut rows =
            LockedRows::acquire(tx, scope.project.id, scope.warehouse_id, &material_ids).await?;
        reconcile::lock_in_order(tx, &movement.resolved_requisition_ids()).await?;

        let created_assets = asset_moves::lock_created_assets(tx, &movement, &scope).await?;

        for line in &movement.lines {
            match scope.direction {
                Direction::Inbound => {
                    self.reverse_inbound(tx, &movement, &scope, &mut rows, line)
                        .await?
                }
                Direction::Outbound => {
                    self.reverse_outbound(tx, &movement, &scope, &mut rows, line)
                        .await?
                }
            }
        }

        tx.delete_assignments_opened_by(movement.id).await?;
        tx.delete_ppe_deliveries(movement.id).await?;
        if created_assets > 0 {
            tx.delete_assets_by_origin(movement.id).await?;
            tracing::debug!(
                movement_id = %movement.id,
                assets = created_assets,
                "Removed assets created by purchase"
            );
        }

        movement.status = MovementStatus::Cancelled;
        tx.save_movement(&movement).await?;
        Ok(movement)
    }

    // ========================================================================
    // Scope resolution
    // ========================================================================

    /// Resolves the header and checks master data before anything is locked
    async fn confirm_scope(&self, tx: &mut dyn LedgerTx, movement: &Movement) -> AppResult<Scope> {
        let mut scope = Self::base_scope(tx, movement).await?;

        if let Some(destination) = movement.destination_warehouse_id {
            if scope.direction == Direction::Outbound && tx.get_warehouse(destination).await?.is_none()
            {
                return Err(AppError::NotFound("Destination warehouse".to_string()));
            }
        }

        if let Some(worker_id) = movement.worker_id {
            let worker = tx
                .get_worker(worker_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Worker".to_string()))?;
            if !worker.is_active {
                return Err(AppError::validation(
                    "worker_id",
                    &format!("Worker {} is inactive", worker.full_name()),
                    &format!("El trabajador {} está inactivo", worker.full_name()),
                ));
            }
            scope.worker = Some(worker);
        }

        for line in &movement.lines {
            shared::validate_quantity(line.quantity).map_err(|msg| {
                AppError::validation("quantity", msg, "La cantidad debe ser mayor a cero")
            })?;
        }

        for material_id in movement.material_ids() {
            let material = tx
                .get_material(material_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Material {}", material_id)))?;
            if !material.is_active {
                return Err(AppError::validation(
                    "material_id",
                    &format!("Material {} is inactive", material.code),
                    &format!("El material {} está inactivo", material.code),
                ));
            }
            scope.materials.insert(material_id, material);
        }

        Ok(scope)
    }

    /// Reversal only needs the header facts; master data may have changed since
    async fn reverse_scope(&self, tx: &mut dyn LedgerTx, movement: &Movement) -> AppResult<Scope> {
        let mut scope = Self::base_scope(tx, movement).await?;
        for material_id in movement.material_ids() {
            if let Some(material) = tx.get_material(material_id).await? {
                scope.materials.insert(material_id, material);
            }
        }
        Ok(scope)
    }

    async fn base_scope(tx: &mut dyn LedgerTx, movement: &Movement) -> AppResult<Scope> {
        let project = tx
            .get_project(movement.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project".to_string()))?;

        let direction = movement.direction().ok_or_else(|| {
            AppError::validation(
                "warehouse",
                "An inventory adjustment needs a source or destination warehouse",
                "Un ajuste de inventario necesita almacén de origen o destino",
            )
        })?;

        let warehouse_id = movement.stock_warehouse_id().ok_or_else(|| match direction {
            Direction::Inbound => AppError::validation(
                "destination_warehouse_id",
                "Inbound movements need a destination warehouse",
                "Los ingresos necesitan un almacén de destino",
            ),
            Direction::Outbound => AppError::validation(
                "source_warehouse_id",
                "Outbound movements need a source warehouse",
                "Las salidas necesitan un almacén de origen",
            ),
        })?;

        let warehouse = tx
            .get_warehouse(warehouse_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;
        if warehouse.project_id != project.id {
            return Err(AppError::validation(
                "warehouse",
                &format!("Warehouse {} does not belong to project {}", warehouse, project.code),
                &format!("El almacén {} no pertenece al proyecto {}", warehouse, project.code),
            ));
        }

        Ok(Scope {
            project,
            direction,
            warehouse_id,
            worker: None,
            materials: HashMap::new(),
        })
    }

    // ========================================================================
    // Confirm
    // ========================================================================

    async fn confirm_inbound(
        &self,
        tx: &mut dyn LedgerTx,
        movement: &Movement,
        scope: &Scope,
        rows: &mut LockedRows,
        line: &mut MovementLine,
    ) -> AppResult<()> {
        let material = scope.material(line.material_id)?;

        let unit_cost = if scope.cost_control() {
            if line.unit_cost <= Decimal::ZERO {
                return Err(AppError::InvalidCost {
                    material: material.code.clone(),
                    unit_cost: line.unit_cost,
                });
            }
            Some(line.unit_cost)
        } else {
            None
        };

        let (stock, existence) = rows.pair_mut(line.material_id)?;
        stock.quantity += line.quantity;
        existence.receive(line.quantity, unit_cost);
        tx.save_stock(stock).await?;
        tx.save_existence(existence).await?;

        tracing::debug!(
            material = %material.code,
            quantity = %line.quantity,
            stock = %stock.quantity,
            average_cost = %existence.average_cost,
            "Inbound line applied"
        );

        match line.asset_id {
            Some(asset_id) => {
                asset_moves::receive_linked(tx, movement, scope, line, asset_id).await?
            }
            None => {
                asset_moves::create_purchased(tx, movement, scope, line, self.config.serial_separator)
                    .await?
            }
        }

        reconcile::receive(tx, movement, scope, line).await
    }

    async fn confirm_outbound(
        &self,
        tx: &mut dyn LedgerTx,
        movement: &Movement,
        scope: &Scope,
        rows: &mut LockedRows,
        line: &mut MovementLine,
    ) -> AppResult<()> {
        let material = scope.material(line.material_id)?;
        let (stock, existence) = rows.pair_mut(line.material_id)?;

        if stock.quantity < line.quantity {
            return Err(AppError::InsufficientStock {
                material: material.code.clone(),
                available: stock.quantity,
                requested: line.quantity,
            });
        }

        if movement.linked_requisition(line).is_none() {
            reservation::guard_free_stock(
                tx,
                scope.project.id,
                material,
                existence.total_project_quantity,
                line.quantity,
                self.config.reservation_report_limit,
            )
            .await?;
        }

        stock.quantity -= line.quantity;
        existence.issue(line.quantity);
        line.unit_cost = existence.average_cost;
        tx.save_stock(stock).await?;
        tx.save_existence(existence).await?;

        tracing::debug!(
            material = %material.code,
            quantity = %line.quantity,
            stock = %stock.quantity,
            unit_cost = %line.unit_cost,
            "Outbound line applied"
        );

        if let Some(asset_id) = line.asset_id {
            asset_moves::issue_linked(tx, movement, scope, line, asset_id).await?;
        }

        asset_moves::record_ppe_delivery(tx, movement, scope, line).await?;

        reconcile::fulfill(tx, movement, scope, line).await
    }

    // ========================================================================
    // Reverse
    // ========================================================================

    async fn reverse_inbound(
        &self,
        tx: &mut dyn LedgerTx,
        movement: &Movement,
        scope: &Scope,
        rows: &mut LockedRows,
        line: &MovementLine,
    ) -> AppResult<()> {
        let label = material_label(scope, line.material_id);
        let cost_control = scope.cost_control();
        let (stock, existence) = rows.pair_mut(line.material_id)?;

        if stock.quantity < line.quantity {
            return Err(AppError::CannotReverse(format!(
                "{}: stock on hand {} is less than the {} received",
                label, stock.quantity, line.quantity
            )));
        }

        stock.quantity -= line.quantity;
        existence.unreceive(line.quantity, cost_control.then_some(line.unit_cost));
        tx.save_stock(stock).await?;
        tx.save_existence(existence).await?;

        tracing::debug!(
            material = %label,
            quantity = %line.quantity,
            average_cost = %existence.average_cost,
            "Inbound line reversed"
        );

        if line.asset_id.is_some() {
            asset_moves::restore_linked(tx, movement, scope, line).await?;
        }

        reconcile::unreceive(tx, line).await
    }

    async fn reverse_outbound(
        &self,
        tx: &mut dyn LedgerTx,
        movement: &Movement,
        scope: &Scope,
        rows: &mut LockedRows,
        line: &MovementLine,
    ) -> AppResult<()> {
        let (stock, existence) = rows.pair_mut(line.material_id)?;

        stock.quantity += line.quantity;
        existence.unissue(line.quantity);
        tx.save_stock(stock).await?;
        tx.save_existence(existence).await?;

        tracing::debug!(
            material = %material_label(scope, line.material_id),
            quantity = %line.quantity,
            "Outbound line reversed"
        );

        if let Some(asset_id) = line.asset_id {
            asset_moves::recall_issued(tx, movement, scope, asset_id).await?;
        }

        reconcile::unfulfill(tx, line).await
    }
}

fn material_label(scope: &Scope, material_id: Uuid) -> String {
    scope
        .materials
        .get(&material_id)
        .map(|m| m.code.clone())
        .unwrap_or_else(|| material_id.to_string())
}
