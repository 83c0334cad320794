//! Draft movement service: header rules and entry-note numbering

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{generate_entry_note, EffectGroup, Movement, MovementLine, MovementStatus, MovementType};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::repositories::{LedgerStore, LedgerTx};
use crate::services::finish;

/// Service for creating and reading movements
#[derive(Clone)]
pub struct MovementService {
    store: Arc<dyn LedgerStore>,
}

/// Input for creating a draft movement
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMovementInput {
    pub project_id: Uuid,
    pub movement_type: MovementType,
    pub moved_at: Option<DateTime<Utc>>,
    #[validate(custom = "reference_document")]
    pub reference_document: String,
    pub requisition_id: Option<Uuid>,
    pub source_warehouse_id: Option<Uuid>,
    pub destination_warehouse_id: Option<Uuid>,
    pub tower_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    #[serde(default)]
    pub notes: String,
    #[validate(length(min = 1, message = "A movement needs at least one line"))]
    pub lines: Vec<MovementLineInput>,
}

/// One line of a draft movement
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MovementLineInput {
    pub material_id: Uuid,
    #[validate(custom = "positive_quantity")]
    pub quantity: Decimal,
    #[serde(default)]
    #[validate(custom = "non_negative_cost")]
    pub unit_cost: Decimal,
    pub serials: Option<String>,
    pub asset_id: Option<Uuid>,
    pub requisition_id: Option<Uuid>,
    #[serde(default)]
    pub is_free_stock: bool,
}

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn reference_document(value: &str) -> Result<(), ValidationError> {
    shared::validate_reference_document(value).map_err(|msg| rule_error("reference_document", msg))
}

fn positive_quantity(value: &Decimal) -> Result<(), ValidationError> {
    shared::validate_quantity(*value).map_err(|msg| rule_error("quantity", msg))
}

fn non_negative_cost(value: &Decimal) -> Result<(), ValidationError> {
    shared::validate_unit_cost(*value).map_err(|msg| rule_error("unit_cost", msg))
}

/// Header fields each movement type needs before it can be saved
pub fn check_header(input: &CreateMovementInput) -> AppResult<()> {
    let movement_type = input.movement_type;

    if movement_type == MovementType::SiteOut && input.tower_id.is_none() {
        return Err(AppError::validation(
            "tower_id",
            "Site consumption must name the tower it is charged to",
            "La salida a obra debe indicar la torre",
        ));
    }

    if movement_type.requires_worker() && input.worker_id.is_none() {
        return Err(AppError::validation(
            "worker_id",
            "This movement type must name the worker receiving the material",
            "Este tipo de movimiento debe indicar el trabajador que recibe",
        ));
    }

    match movement_type.effect_group() {
        EffectGroup::Inbound if input.destination_warehouse_id.is_none() => {
            Err(AppError::validation(
                "destination_warehouse_id",
                "Inbound movements need a destination warehouse",
                "Los ingresos necesitan un almacén de destino",
            ))
        }
        EffectGroup::Outbound if input.source_warehouse_id.is_none() => Err(AppError::validation(
            "source_warehouse_id",
            "Outbound movements need a source warehouse",
            "Las salidas necesitan un almacén de origen",
        )),
        EffectGroup::Adjustment
            if input.source_warehouse_id.is_none() && input.destination_warehouse_id.is_none() =>
        {
            Err(AppError::validation(
                "warehouse",
                "An inventory adjustment needs a source or destination warehouse",
                "Un ajuste de inventario necesita almacén de origen o destino",
            ))
        }
        _ => Ok(()),
    }
}

impl MovementService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Save a new movement in DRAFT status
    pub async fn create_draft(&self, input: CreateMovementInput) -> AppResult<Movement> {
        input.validate()?;
        for line in &input.lines {
            line.validate()?;
        }
        check_header(&input)?;

        let mut tx = self.store.begin().await?;
        let result = Self::insert_draft(&mut *tx, input).await;
        let movement = finish(tx, result).await?;

        tracing::info!(
            movement_id = %movement.id,
            movement_type = movement.movement_type.as_str(),
            entry_note = movement.entry_note.as_deref().unwrap_or("-"),
            "Draft movement created"
        );
        Ok(movement)
    }

    /// Get a movement with its lines
    pub async fn get(&self, movement_id: Uuid) -> AppResult<Movement> {
        let mut tx = self.store.begin().await?;
        let result = tx.find_movement(movement_id).await;
        finish(tx, result)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))
    }

    async fn insert_draft(
        tx: &mut dyn LedgerTx,
        input: CreateMovementInput,
    ) -> AppResult<Movement> {
        let project = tx
            .get_project(input.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project".to_string()))?;
        if !project.is_active {
            return Err(AppError::validation(
                "project_id",
                &format!("Project {} is closed", project.code),
                &format!("El proyecto {} está cerrado", project.code),
            ));
        }

        for warehouse_id in [input.source_warehouse_id, input.destination_warehouse_id]
            .into_iter()
            .flatten()
        {
            tx.get_warehouse(warehouse_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;
        }

        let entry_note = if input.movement_type == MovementType::PurchaseIn {
            let sequence = tx.next_entry_note_sequence(project.id).await?;
            Some(generate_entry_note(sequence))
        } else {
            None
        };

        let movement_id = Uuid::new_v4();
        let movement = Movement {
            id: movement_id,
            project_id: project.id,
            movement_type: input.movement_type,
            status: MovementStatus::Draft,
            moved_at: input.moved_at.unwrap_or_else(Utc::now),
            reference_document: input.reference_document.trim().to_string(),
            entry_note,
            requisition_id: input.requisition_id,
            source_warehouse_id: input.source_warehouse_id,
            destination_warehouse_id: input.destination_warehouse_id,
            tower_id: input.tower_id,
            worker_id: input.worker_id,
            notes: input.notes,
            lines: input
                .lines
                .into_iter()
                .map(|line| MovementLine {
                    id: Uuid::new_v4(),
                    movement_id,
                    material_id: line.material_id,
                    quantity: line.quantity,
                    unit_cost: line.unit_cost,
                    serials: line.serials,
                    asset_id: line.asset_id,
                    requisition_id: line.requisition_id,
                    resolved_requisition_id: None,
                    is_free_stock: line.is_free_stock,
                    prior_asset: None,
                })
                .collect(),
        };

        tx.insert_movement(&movement).await?;
        Ok(movement)
    }
}
