//! Business logic services for the Site Kardex ledger

pub mod assets;
pub mod inventory;
pub mod kardex;
pub mod movement;
pub mod requisition;

pub use assets::AssetService;
pub use inventory::InventoryService;
pub use kardex::KardexService;
pub use movement::MovementService;
pub use requisition::RequisitionService;

use crate::error::AppResult;
use crate::repositories::LedgerTx;

/// Commit on success, roll back on failure
pub(crate) async fn finish<T>(tx: Box<dyn LedgerTx>, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("Rollback failed after {}: {}", err.kind(), rollback_err);
            }
            Err(err)
        }
    }
}
