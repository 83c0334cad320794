//! Draft movement tests
//!
//! Header rules per movement type, input validation and entry-note numbering.

mod common;

use common::{costed, line, Fixture};
use kardex_backend::error::AppError;
use kardex_backend::services::movement::check_header;
use shared::{MovementStatus, MovementType, Project};
use uuid::Uuid;

fn field_of(result: Result<impl std::fmt::Debug, AppError>) -> String {
    match result {
        Err(AppError::Validation { field, .. }) => field,
        other => panic!("expected a validation error, got {:?}", other),
    }
}

// ============================================================================
// Header rules
// ============================================================================

mod header_rules {
    use super::*;

    #[tokio::test]
    async fn test_complete_headers_pass() {
        let fx = Fixture::new().await;
        for movement_type in [
            MovementType::PurchaseIn,
            MovementType::SiteOut,
            MovementType::PpeOut,
            MovementType::OfficeOut,
            MovementType::TransferOut,
            MovementType::TransferIn,
            MovementType::SiteReturnIn,
            MovementType::CentralReturnOut,
            MovementType::CentralReentryIn,
            MovementType::InventoryAdjustment,
        ] {
            let input = fx.input(movement_type, vec![line(fx.cement.id, 1)]);
            assert!(check_header(&input).is_ok(), "{} should pass", movement_type);
        }
    }

    #[tokio::test]
    async fn test_site_out_needs_tower() {
        let fx = Fixture::new().await;
        let mut input = fx.input(MovementType::SiteOut, vec![line(fx.cement.id, 1)]);
        input.tower_id = None;

        assert_eq!(field_of(check_header(&input)), "tower_id");
    }

    #[tokio::test]
    async fn test_worker_required_for_personal_issues() {
        let fx = Fixture::new().await;
        for movement_type in [MovementType::PpeOut, MovementType::OfficeOut] {
            let mut input = fx.input(movement_type, vec![line(fx.cement.id, 1)]);
            input.worker_id = None;

            assert_eq!(field_of(check_header(&input)), "worker_id");
        }
    }

    #[tokio::test]
    async fn test_warehouse_sides() {
        let fx = Fixture::new().await;

        let mut inbound = fx.input(MovementType::PurchaseIn, vec![line(fx.cement.id, 1)]);
        inbound.destination_warehouse_id = None;
        assert_eq!(field_of(check_header(&inbound)), "destination_warehouse_id");

        let mut outbound = fx.input(MovementType::TransferOut, vec![line(fx.cement.id, 1)]);
        outbound.source_warehouse_id = None;
        assert_eq!(field_of(check_header(&outbound)), "source_warehouse_id");

        let mut adjustment = fx.input(MovementType::InventoryAdjustment, vec![line(fx.cement.id, 1)]);
        adjustment.destination_warehouse_id = None;
        assert_eq!(field_of(check_header(&adjustment)), "warehouse");
    }
}

// ============================================================================
// Draft creation
// ============================================================================

mod drafts {
    use super::*;

    #[tokio::test]
    async fn test_draft_is_saved_unconfirmed() {
        let fx = Fixture::new().await;

        let draft = fx
            .movements()
            .create_draft(fx.input(MovementType::PurchaseIn, vec![costed(fx.cement.id, 4, "2.5")]))
            .await
            .unwrap();

        assert_eq!(draft.status, MovementStatus::Draft);
        assert_eq!(draft.lines.len(), 1);
        assert_eq!(draft.lines[0].movement_id, draft.id);
        let reloaded = fx.movements().get(draft.id).await.unwrap();
        assert_eq!(reloaded.reference_document, "GR-001-000123");
        assert_eq!(
            fx.stock_qty(fx.warehouse.id, fx.cement.id).await,
            rust_decimal::Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_entry_notes_numbered_per_project() {
        let fx = Fixture::new().await;
        let movements = fx.movements();

        let first = movements
            .create_draft(fx.input(MovementType::PurchaseIn, vec![costed(fx.cement.id, 1, "1")]))
            .await
            .unwrap();
        let second = movements
            .create_draft(fx.input(MovementType::PurchaseIn, vec![costed(fx.cement.id, 1, "1")]))
            .await
            .unwrap();
        let issue = movements
            .create_draft(fx.input(MovementType::OfficeOut, vec![line(fx.cement.id, 1)]))
            .await
            .unwrap();

        assert_eq!(first.entry_note.as_deref(), Some("NI-00001"));
        assert_eq!(second.entry_note.as_deref(), Some("NI-00002"));
        assert_eq!(issue.entry_note, None);

        let other = Project {
            id: Uuid::new_v4(),
            code: "VS-200".to_string(),
            name: "Villa Sol".to_string(),
            uses_cost_control: true,
            is_active: true,
        };
        fx.store.insert_project(other.clone()).await;
        let mut elsewhere = fx.input(MovementType::PurchaseIn, vec![costed(fx.cement.id, 1, "1")]);
        elsewhere.project_id = other.id;
        let third = movements.create_draft(elsewhere).await.unwrap();
        assert_eq!(third.entry_note.as_deref(), Some("NI-00001"));
    }

    #[tokio::test]
    async fn test_input_validation() {
        let fx = Fixture::new().await;
        let movements = fx.movements();

        let mut blank = fx.input(MovementType::PurchaseIn, vec![costed(fx.cement.id, 1, "1")]);
        blank.reference_document = "   ".to_string();
        assert_eq!(
            field_of(movements.create_draft(blank).await),
            "reference_document"
        );

        let empty = fx.input(MovementType::PurchaseIn, vec![]);
        assert_eq!(field_of(movements.create_draft(empty).await), "lines");

        let zero = fx.input(MovementType::PurchaseIn, vec![line(fx.cement.id, 0)]);
        assert_eq!(field_of(movements.create_draft(zero).await), "quantity");

        let negative = fx.input(MovementType::PurchaseIn, vec![costed(fx.cement.id, 1, "-3")]);
        assert_eq!(field_of(movements.create_draft(negative).await), "unit_cost");
    }

    #[test]
    fn test_line_input_serializes_with_decimal_strings() {
        let input = costed(Uuid::new_v4(), 2, "4.50");
        let json = serde_json::to_value(&input).unwrap();

        assert_eq!(json["quantity"], "2");
        assert_eq!(json["unit_cost"], "4.50");
        assert_eq!(json["is_free_stock"], false);
    }

    #[tokio::test]
    async fn test_closed_project_rejected() {
        let fx = Fixture::new().await;
        let closed = Project {
            id: Uuid::new_v4(),
            code: "OLD-01".to_string(),
            name: "Finished tower".to_string(),
            uses_cost_control: false,
            is_active: false,
        };
        fx.store.insert_project(closed.clone()).await;

        let mut input = fx.input(MovementType::PurchaseIn, vec![line(fx.cement.id, 1)]);
        input.project_id = closed.id;

        assert_eq!(
            field_of(fx.movements().create_draft(input).await),
            "project_id"
        );
    }

    #[tokio::test]
    async fn test_unknown_movement_not_found() {
        let fx = Fixture::new().await;

        let result = fx.movements().get(Uuid::new_v4()).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
