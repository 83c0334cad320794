//! Ledger fixtures shared by the integration tests
//!
//! One project with two warehouses, a consumable, a fixed asset, a PPE item
//! and an active worker, all held in an `InMemoryLedgerStore`.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use kardex_backend::config::KardexConfig;
use kardex_backend::error::AppResult;
use kardex_backend::repositories::{InMemoryLedgerStore, LedgerStore};
use kardex_backend::services::movement::{CreateMovementInput, MovementLineInput};
use kardex_backend::services::{
    AssetService, InventoryService, KardexService, MovementService, RequisitionService,
};
use rust_decimal::Decimal;
use shared::{
    Asset, EffectGroup, Existence, Kit, Material, MaterialKind, Movement,
    MovementType, Project, Requisition, RequisitionLine, RequisitionPriority, RequisitionStatus,
    Warehouse, Worker,
};
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn line(material_id: Uuid, quantity: i64) -> MovementLineInput {
    MovementLineInput {
        material_id,
        quantity: Decimal::from(quantity),
        unit_cost: Decimal::ZERO,
        serials: None,
        asset_id: None,
        requisition_id: None,
        is_free_stock: false,
    }
}

pub fn costed(material_id: Uuid, quantity: i64, unit_cost: &str) -> MovementLineInput {
    MovementLineInput {
        unit_cost: dec(unit_cost),
        ..line(material_id, quantity)
    }
}

fn material(code: &str, kind: MaterialKind) -> Material {
    Material {
        id: Uuid::new_v4(),
        code: code.to_string(),
        description: format!("{} test item", code),
        unit_of_measure: "UND".to_string(),
        kind,
        is_active: true,
    }
}

fn warehouse(project_id: Uuid, code: &str, is_primary: bool) -> Warehouse {
    Warehouse {
        id: Uuid::new_v4(),
        project_id,
        code: code.to_string(),
        name: format!("Warehouse {}", code),
        is_primary,
        location: None,
    }
}

pub struct Fixture {
    pub store: InMemoryLedgerStore,
    pub project: Project,
    pub warehouse: Warehouse,
    pub other_warehouse: Warehouse,
    pub cement: Material,
    pub drill: Material,
    pub helmet: Material,
    pub worker: Worker,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_cost_control(true).await
    }

    pub async fn with_cost_control(uses_cost_control: bool) -> Self {
        let store = InMemoryLedgerStore::new();

        let project = Project {
            id: Uuid::new_v4(),
            code: "LT-500".to_string(),
            name: "Los Tulipanes".to_string(),
            uses_cost_control,
            is_active: true,
        };
        let main = warehouse(project.id, "ALM-01", true);
        let annex = warehouse(project.id, "ALM-02", false);
        let cement = material("CEM-01", MaterialKind::Consumable);
        let drill = material("DRL-01", MaterialKind::FixedAsset);
        let helmet = material("EPP-01", MaterialKind::Ppe);
        let worker = Worker {
            id: Uuid::new_v4(),
            dni: "45879632".to_string(),
            first_names: "Rosa".to_string(),
            last_names: "Quispe Mamani".to_string(),
            position: Some("Operator".to_string()),
            is_active: true,
        };

        store.insert_project(project.clone()).await;
        store.insert_warehouse(main.clone()).await;
        store.insert_warehouse(annex.clone()).await;
        for m in [&cement, &drill, &helmet] {
            store.insert_material(m.clone()).await;
        }
        store.insert_worker(worker.clone()).await;

        Self {
            store,
            project,
            warehouse: main,
            other_warehouse: annex,
            cement,
            drill,
            helmet,
            worker,
        }
    }

    pub fn store(&self) -> Arc<dyn LedgerStore> {
        Arc::new(self.store.clone())
    }

    pub fn kardex(&self) -> KardexService {
        KardexService::new(self.store(), KardexConfig::default())
    }

    pub fn movements(&self) -> MovementService {
        MovementService::new(self.store())
    }

    pub fn requisitions(&self) -> RequisitionService {
        RequisitionService::new(self.store())
    }

    pub fn assets(&self) -> AssetService {
        AssetService::new(self.store())
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.store())
    }

    /// Draft input with the header fields its type needs, against the main warehouse
    pub fn input(
        &self,
        movement_type: MovementType,
        lines: Vec<MovementLineInput>,
    ) -> CreateMovementInput {
        let (source, destination) = match movement_type.effect_group() {
            EffectGroup::Inbound => (None, Some(self.warehouse.id)),
            EffectGroup::Outbound if movement_type == MovementType::TransferOut => {
                (Some(self.warehouse.id), Some(self.other_warehouse.id))
            }
            EffectGroup::Outbound => (Some(self.warehouse.id), None),
            EffectGroup::Adjustment => (None, Some(self.warehouse.id)),
        };

        CreateMovementInput {
            project_id: self.project.id,
            movement_type,
            moved_at: None,
            reference_document: "GR-001-000123".to_string(),
            requisition_id: None,
            source_warehouse_id: source,
            destination_warehouse_id: destination,
            tower_id: (movement_type == MovementType::SiteOut).then(Uuid::new_v4),
            worker_id: movement_type.requires_worker().then_some(self.worker.id),
            notes: String::new(),
            lines,
        }
    }

    /// Draft then confirm
    pub async fn post(&self, input: CreateMovementInput) -> AppResult<Movement> {
        let draft = self.movements().create_draft(input).await?;
        self.kardex().confirm(draft.id).await
    }

    pub async fn purchase(&self, material_id: Uuid, quantity: i64, unit_cost: &str) -> Movement {
        let input = self.input(
            MovementType::PurchaseIn,
            vec![costed(material_id, quantity, unit_cost)],
        );
        self.post(input).await.expect("purchase should confirm")
    }

    /// Registers serialized drills in the main warehouse
    pub async fn purchase_drills(&self, serials: &str) -> Vec<Asset> {
        let count = serials.split(',').count() as i64;
        let mut purchase_line = costed(self.drill.id, count, "350.00");
        purchase_line.serials = Some(serials.to_string());
        self.post(self.input(MovementType::PurchaseIn, vec![purchase_line]))
            .await
            .expect("drill purchase should confirm");

        let state = self.store.snapshot().await;
        serials
            .split(',')
            .map(|s| state.asset_by_serial(s.trim()).cloned().expect("asset created"))
            .collect()
    }

    pub async fn requisition(
        &self,
        code: &str,
        day: u32,
        lines: &[(Uuid, i64)],
    ) -> Requisition {
        let id = Uuid::new_v4();
        let requisition = Requisition {
            id,
            project_id: self.project.id,
            code: code.to_string(),
            requester: "Site resident".to_string(),
            requested_on: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            needed_by: None,
            priority: RequisitionPriority::Medium,
            status: RequisitionStatus::Pending,
            closed_manually: false,
            notes: String::new(),
            lines: lines
                .iter()
                .map(|&(material_id, qty)| RequisitionLine {
                    id: Uuid::new_v4(),
                    requisition_id: id,
                    material_id,
                    requested_qty: Decimal::from(qty),
                    received_qty: Decimal::ZERO,
                    fulfilled_qty: Decimal::ZERO,
                })
                .collect(),
        };
        self.store.insert_requisition(requisition.clone()).await;
        requisition
    }

    pub async fn kit(&self, code: &str, members: &[Asset]) -> Kit {
        let kit = Kit {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: format!("Kit {}", code),
        };
        self.store.insert_kit(kit.clone()).await;
        for asset in members {
            let mut member = asset.clone();
            member.kit_id = Some(kit.id);
            self.store.insert_asset(member).await;
        }
        kit
    }

    pub async fn stock_qty(&self, warehouse_id: Uuid, material_id: Uuid) -> Decimal {
        self.store
            .snapshot()
            .await
            .stock(warehouse_id, material_id)
            .map(|s| s.quantity)
            .unwrap_or_default()
    }

    pub async fn existence(&self, material_id: Uuid) -> Existence {
        self.store
            .snapshot()
            .await
            .existence(self.project.id, material_id)
            .cloned()
            .unwrap_or_else(|| Existence::new(self.project.id, material_id))
    }

    pub async fn requisition_state(&self, id: Uuid) -> Requisition {
        self.store
            .snapshot()
            .await
            .requisition(id)
            .cloned()
            .expect("requisition exists")
    }

    pub async fn asset_state(&self, id: Uuid) -> Asset {
        self.store
            .snapshot()
            .await
            .asset(id)
            .cloned()
            .expect("asset exists")
    }

    pub async fn assert_ledger_balanced(&self, material_id: Uuid) {
        let state = self.store.snapshot().await;
        let total = state.project_stock_total(self.project.id, material_id);
        let existence = state
            .existence(self.project.id, material_id)
            .map(|e| e.total_project_quantity)
            .unwrap_or_default();
        assert_eq!(total, existence, "stock across warehouses must match the existence card");
    }
}
