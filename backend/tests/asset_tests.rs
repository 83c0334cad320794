//! Fixed-asset and PPE tests
//!
//! Serial ingestion on purchases, custody changes driven by movements,
//! deterministic reversal, and direct assignment of assets and kits.

mod common;

use common::{costed, line, Fixture};
use kardex_backend::error::AppError;
use kardex_backend::services::assets::{AssignInput, ReturnInput};
use rust_decimal::Decimal;
use shared::{AssetState, MovementType};

// ============================================================================
// Serial ingestion
// ============================================================================

mod ingestion {
    use super::*;

    #[tokio::test]
    async fn test_purchase_registers_one_asset_per_serial() {
        let fx = Fixture::new().await;

        let assets = fx.purchase_drills("A,B,C").await;

        assert_eq!(assets.len(), 3);
        for asset in &assets {
            assert_eq!(asset.state, AssetState::Available);
            assert_eq!(asset.location_id, Some(fx.warehouse.id));
            assert!(asset.current_holder_id.is_none());
            assert!(asset.origin_movement_id.is_some());
        }
        assert_eq!(assets[0].code, "DRL-01-A");
        assert_eq!(
            fx.stock_qty(fx.warehouse.id, fx.drill.id).await,
            Decimal::from(3)
        );
    }

    #[tokio::test]
    async fn test_serial_count_mismatch_creates_nothing() {
        let fx = Fixture::new().await;
        let mut purchase = costed(fx.drill.id, 3, "350");
        purchase.serials = Some("A,B".to_string());

        let result = fx.post(fx.input(MovementType::PurchaseIn, vec![purchase])).await;

        match result {
            Err(AppError::SerialCountMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, Decimal::from(3));
                assert_eq!(found, 2);
            }
            other => panic!("expected SerialCountMismatch, got {:?}", other),
        }
        assert_eq!(fx.store.snapshot().await.asset_count(), 0);
        assert_eq!(fx.stock_qty(fx.warehouse.id, fx.drill.id).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_duplicate_serials_rejected() {
        let fx = Fixture::new().await;

        let mut repeated = costed(fx.drill.id, 2, "350");
        repeated.serials = Some("X1, X1".to_string());
        let result = fx.post(fx.input(MovementType::PurchaseIn, vec![repeated])).await;
        assert!(matches!(result, Err(AppError::DuplicateSerial(ref s)) if s == "X1"));

        fx.purchase_drills("S1").await;
        let mut again = costed(fx.drill.id, 1, "350");
        again.serials = Some("S1".to_string());
        let result = fx.post(fx.input(MovementType::PurchaseIn, vec![again])).await;
        assert!(matches!(result, Err(AppError::DuplicateSerial(_))));
    }

    #[tokio::test]
    async fn test_duplicate_serial_across_lines_of_one_movement() {
        let fx = Fixture::new().await;
        let mut first = costed(fx.drill.id, 1, "350");
        first.serials = Some("D1".to_string());
        let mut second = costed(fx.drill.id, 1, "350");
        second.serials = Some("D1".to_string());

        let result = fx
            .post(fx.input(MovementType::PurchaseIn, vec![first, second]))
            .await;

        assert!(matches!(result, Err(AppError::DuplicateSerial(_))));
        assert_eq!(fx.store.snapshot().await.asset_count(), 0);
    }

    #[tokio::test]
    async fn test_reverse_purchase_removes_created_assets() {
        let fx = Fixture::new().await;
        let mut purchase = costed(fx.drill.id, 2, "350");
        purchase.serials = Some("P1,P2".to_string());
        let movement = fx
            .post(fx.input(MovementType::PurchaseIn, vec![purchase]))
            .await
            .unwrap();

        fx.kardex().reverse(movement.id).await.unwrap();

        assert_eq!(fx.store.snapshot().await.asset_count(), 0);
        assert_eq!(fx.stock_qty(fx.warehouse.id, fx.drill.id).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reverse_purchase_refused_once_asset_left() {
        let fx = Fixture::new().await;
        let assets = fx.purchase_drills("Q1,Q2").await;
        let origin = assets[0].origin_movement_id.unwrap();

        let mut issue = line(fx.drill.id, 1);
        issue.asset_id = Some(assets[0].id);
        fx.post(fx.input(MovementType::OfficeOut, vec![issue]))
            .await
            .unwrap();

        let result = fx.kardex().reverse(origin).await;

        assert!(matches!(result, Err(AppError::CannotReverse(_))));
        assert_eq!(fx.store.snapshot().await.asset_count(), 2);
    }
}

// ============================================================================
// Custody through movements
// ============================================================================

mod custody {
    use super::*;

    #[tokio::test]
    async fn test_issue_and_return_cycle() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("C1,C2,C3").await.remove(0);

        let mut issue = line(fx.drill.id, 1);
        issue.asset_id = Some(drill.id);
        let site_out = fx
            .post(fx.input(MovementType::SiteOut, vec![issue]))
            .await
            .unwrap();

        let held = fx.asset_state(drill.id).await;
        assert_eq!(held.state, AssetState::Assigned);
        assert_eq!(held.current_holder_id, Some(fx.worker.id));
        assert_eq!(held.location_id, Some(fx.warehouse.id));
        let holdings = fx.inventory().assets_held_by(fx.worker.id).await.unwrap();
        assert_eq!(holdings.len(), 1);

        let state = fx.store.snapshot().await;
        let assignments = state.assignments_of(drill.id);
        assert_eq!(assignments.len(), 1);
        assert!(assignments[0].is_open());
        assert_eq!(assignments[0].movement_id, Some(site_out.id));

        let mut back = costed(fx.drill.id, 1, "350");
        back.asset_id = Some(drill.id);
        let site_return = fx
            .post(fx.input(MovementType::SiteReturnIn, vec![back]))
            .await
            .unwrap();

        let returned = fx.asset_state(drill.id).await;
        assert_eq!(returned.state, AssetState::Available);
        assert!(returned.current_holder_id.is_none());
        let state = fx.store.snapshot().await;
        let closed = state.assignments_of(drill.id)[0].clone();
        assert!(!closed.is_open());
        assert_eq!(closed.closed_by_movement_id, Some(site_return.id));
        assert!(fx
            .inventory()
            .assets_held_by(fx.worker.id)
            .await
            .unwrap()
            .is_empty());

        fx.kardex().reverse(site_return.id).await.unwrap();

        let restored = fx.asset_state(drill.id).await;
        assert_eq!(restored.state, AssetState::Assigned);
        assert_eq!(restored.current_holder_id, Some(fx.worker.id));
        let state = fx.store.snapshot().await;
        assert!(state.assignments_of(drill.id)[0].is_open());

        fx.kardex().reverse(site_out.id).await.unwrap();

        let shelved = fx.asset_state(drill.id).await;
        assert_eq!(shelved.state, AssetState::Available);
        assert!(shelved.current_holder_id.is_none());
        assert!(fx.store.snapshot().await.assignments_of(drill.id).is_empty());
        assert_eq!(
            fx.stock_qty(fx.warehouse.id, fx.drill.id).await,
            Decimal::from(3)
        );
    }

    #[tokio::test]
    async fn test_assigned_asset_cannot_leave_again() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("U1,U2").await.remove(0);
        let mut issue = line(fx.drill.id, 1);
        issue.asset_id = Some(drill.id);
        fx.post(fx.input(MovementType::OfficeOut, vec![issue]))
            .await
            .unwrap();

        let mut again = line(fx.drill.id, 1);
        again.asset_id = Some(drill.id);
        let result = fx.post(fx.input(MovementType::OfficeOut, vec![again])).await;

        assert!(matches!(
            result,
            Err(AppError::AssetUnavailable {
                state: AssetState::Assigned,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_asset_line_must_move_one_unit() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("V1,V2").await.remove(0);

        let mut issue = line(fx.drill.id, 2);
        issue.asset_id = Some(drill.id);
        let result = fx.post(fx.input(MovementType::OfficeOut, vec![issue])).await;

        assert!(matches!(result, Err(AppError::Validation { ref field, .. }) if field == "quantity"));
    }

    #[tokio::test]
    async fn test_transfer_moves_asset_shelf() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("T1").await.remove(0);

        let mut moving = line(fx.drill.id, 1);
        moving.asset_id = Some(drill.id);
        fx.post(fx.input(MovementType::TransferOut, vec![moving]))
            .await
            .unwrap();

        let moved = fx.asset_state(drill.id).await;
        assert_eq!(moved.state, AssetState::Available);
        assert_eq!(moved.location_id, Some(fx.other_warehouse.id));
        assert!(moved.current_holder_id.is_none());
    }

    #[tokio::test]
    async fn test_central_return_and_reentry() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("H1").await.remove(0);

        let mut out = line(fx.drill.id, 1);
        out.asset_id = Some(drill.id);
        fx.post(fx.input(MovementType::CentralReturnOut, vec![out]))
            .await
            .unwrap();

        let away = fx.asset_state(drill.id).await;
        assert_eq!(away.state, AssetState::ReturnedExternal);
        assert!(away.location_id.is_none());

        let mut back = costed(fx.drill.id, 1, "350");
        back.asset_id = Some(drill.id);
        fx.post(fx.input(MovementType::CentralReentryIn, vec![back]))
            .await
            .unwrap();

        let home = fx.asset_state(drill.id).await;
        assert_eq!(home.state, AssetState::Available);
        assert_eq!(home.location_id, Some(fx.warehouse.id));
    }

    #[tokio::test]
    async fn test_superseded_handover_cannot_be_reversed() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("P1,P2").await.remove(0);

        let mut issue = line(fx.drill.id, 1);
        issue.asset_id = Some(drill.id);
        let first_out = fx
            .post(fx.input(MovementType::SiteOut, vec![issue.clone()]))
            .await
            .unwrap();

        let mut back = costed(fx.drill.id, 1, "350");
        back.asset_id = Some(drill.id);
        let site_return = fx
            .post(fx.input(MovementType::SiteReturnIn, vec![back]))
            .await
            .unwrap();

        let second_out = fx
            .post(fx.input(MovementType::SiteOut, vec![issue]))
            .await
            .unwrap();

        let result = fx.kardex().reverse(first_out.id).await;
        assert!(matches!(result, Err(AppError::CannotReverse(_))));

        let held = fx.asset_state(drill.id).await;
        assert_eq!(held.state, AssetState::Assigned);
        assert_eq!(held.current_holder_id, Some(fx.worker.id));
        let state = fx.store.snapshot().await;
        let history = state.assignments_of(drill.id);
        assert_eq!(history.len(), 2);
        assert!(history
            .iter()
            .any(|a| a.is_open() && a.movement_id == Some(second_out.id)));
        assert_eq!(
            fx.stock_qty(fx.warehouse.id, fx.drill.id).await,
            Decimal::ONE
        );

        // Unwinding newest first is still allowed
        fx.kardex().reverse(second_out.id).await.unwrap();
        fx.kardex().reverse(site_return.id).await.unwrap();
        fx.kardex().reverse(first_out.id).await.unwrap();

        let shelved = fx.asset_state(drill.id).await;
        assert_eq!(shelved.state, AssetState::Available);
        assert!(fx.store.snapshot().await.assignments_of(drill.id).is_empty());
        assert_eq!(
            fx.stock_qty(fx.warehouse.id, fx.drill.id).await,
            Decimal::from(2)
        );
    }

    #[tokio::test]
    async fn test_central_return_cannot_be_reversed_after_reentry() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("H2").await.remove(0);

        let mut out = line(fx.drill.id, 1);
        out.asset_id = Some(drill.id);
        let central_out = fx
            .post(fx.input(MovementType::CentralReturnOut, vec![out]))
            .await
            .unwrap();

        let mut back = costed(fx.drill.id, 1, "350");
        back.asset_id = Some(drill.id);
        fx.post(fx.input(MovementType::CentralReentryIn, vec![back]))
            .await
            .unwrap();

        let result = fx.kardex().reverse(central_out.id).await;

        assert!(matches!(result, Err(AppError::CannotReverse(_))));
        let home = fx.asset_state(drill.id).await;
        assert_eq!(home.state, AssetState::Available);
        assert_eq!(home.location_id, Some(fx.warehouse.id));
    }
}

// ============================================================================
// PPE
// ============================================================================

mod ppe {
    use super::*;

    #[tokio::test]
    async fn test_ppe_delivery_recorded_and_reversed() {
        let fx = Fixture::new().await;
        fx.purchase(fx.helmet.id, 5, "15").await;

        let delivery = fx
            .post(fx.input(MovementType::PpeOut, vec![line(fx.helmet.id, 2)]))
            .await
            .unwrap();

        let records = fx.inventory().ppe_deliveries(fx.worker.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, Decimal::from(2));
        assert_eq!(records[0].movement_id, delivery.id);

        fx.kardex().reverse(delivery.id).await.unwrap();

        assert!(fx
            .inventory()
            .ppe_deliveries(fx.worker.id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            fx.stock_qty(fx.warehouse.id, fx.helmet.id).await,
            Decimal::from(5)
        );
    }

    #[tokio::test]
    async fn test_consumables_leave_no_ppe_record() {
        let fx = Fixture::new().await;
        fx.purchase(fx.cement.id, 5, "15").await;

        fx.post(fx.input(MovementType::OfficeOut, vec![line(fx.cement.id, 2)]))
            .await
            .unwrap();

        assert!(fx.store.snapshot().await.ppe_deliveries().is_empty());
    }
}

// ============================================================================
// Direct administration
// ============================================================================

mod administration {
    use super::*;

    fn assign_to(fx: &Fixture, notes: &str) -> AssignInput {
        AssignInput {
            worker_id: fx.worker.id,
            notes: notes.to_string(),
        }
    }

    #[tokio::test]
    async fn test_assign_and_return() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("M1").await.remove(0);

        let assigned = fx
            .assets()
            .assign(drill.id, assign_to(&fx, "formwork crew"))
            .await
            .unwrap();
        assert_eq!(assigned.state, AssetState::Assigned);
        assert_eq!(assigned.current_holder_id, Some(fx.worker.id));
        assert_eq!(assigned.location_id, Some(fx.warehouse.id));

        let returned = fx
            .assets()
            .return_to_stock(drill.id, ReturnInput::default())
            .await
            .unwrap();
        assert_eq!(returned.state, AssetState::Available);
        assert!(returned.current_holder_id.is_none());

        let state = fx.store.snapshot().await;
        let history = state.assignments_of(drill.id);
        assert_eq!(history.len(), 1);
        assert!(!history[0].is_open());
        assert!(history[0].movement_id.is_none());
    }

    #[tokio::test]
    async fn test_return_of_available_asset_is_invalid_state() {
        let fx = Fixture::new().await;
        let drill = fx.purchase_drills("M2").await.remove(0);

        let result = fx
            .assets()
            .return_to_stock(drill.id, ReturnInput::default())
            .await;

        assert!(matches!(result, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_kit_member_cannot_be_assigned_alone() {
        let fx = Fixture::new().await;
        let members = fx.purchase_drills("K1,K2").await;
        fx.kit("KIT-01", &members).await;

        let result = fx
            .assets()
            .assign(members[0].id, assign_to(&fx, ""))
            .await;

        assert!(matches!(result, Err(AppError::Validation { ref field, .. }) if field == "asset_id"));
    }

    #[tokio::test]
    async fn test_assign_kit_hands_over_every_member() {
        let fx = Fixture::new().await;
        let members = fx.purchase_drills("K1,K2").await;
        let kit = fx.kit("KIT-01", &members).await;

        let assigned = fx
            .assets()
            .assign_kit(kit.id, assign_to(&fx, "tower B"))
            .await
            .unwrap();

        assert_eq!(assigned.len(), 2);
        let state = fx.store.snapshot().await;
        for member in &members {
            assert_eq!(state.asset(member.id).unwrap().state, AssetState::Assigned);
            let history = state.assignments_of(member.id);
            assert_eq!(history[0].notes, "KIT KIT-01: tower B");
        }
    }

    #[tokio::test]
    async fn test_assign_kit_is_all_or_nothing() {
        let fx = Fixture::new().await;
        let drills = fx.purchase_drills("K3,K4").await;
        fx.assets()
            .assign(drills[0].id, assign_to(&fx, ""))
            .await
            .unwrap();
        let busy = fx.asset_state(drills[0].id).await;
        let kit = fx.kit("KIT-02", &[busy, drills[1].clone()]).await;

        let result = fx.assets().assign_kit(kit.id, assign_to(&fx, "")).await;

        assert!(matches!(result, Err(AppError::AssetUnavailable { .. })));
        assert_eq!(
            fx.asset_state(drills[1].id).await.state,
            AssetState::Available
        );
    }

    #[tokio::test]
    async fn test_empty_kit_rejected() {
        let fx = Fixture::new().await;
        let kit = fx.kit("KIT-03", &[]).await;

        let result = fx.assets().assign_kit(kit.id, assign_to(&fx, "")).await;

        assert!(matches!(result, Err(AppError::Validation { ref field, .. }) if field == "kit_id"));
    }
}
