//! Personal protective equipment delivery records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// PPE handed to a worker by an outbound movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PpeDelivery {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub material_id: Uuid,
    pub quantity: Decimal,
    pub movement_id: Uuid,
    pub delivered_at: DateTime<Utc>,
}
