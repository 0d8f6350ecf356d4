use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplydesk_core::{SupplyId, TransactionId, UserId};

use crate::supply::StockMovement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    In,
    Out,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::In => "in",
            TransactionKind::Out => "out",
            TransactionKind::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(TransactionKind::In),
            "out" => Some(TransactionKind::Out),
            "adjustment" => Some(TransactionKind::Adjustment),
            _ => None,
        }
    }
}

/// One line of the stock ledger.
///
/// `quantity` is signed: positive for stock in, negative for stock out,
/// either sign for adjustments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub supply_id: SupplyId,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub previous_quantity: u32,
    pub new_quantity: u32,
    pub reason: String,
    pub performed_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl InventoryTransaction {
    /// Ledger line for a stock movement produced by the supply aggregate.
    pub fn record(supply_id: SupplyId, movement: &StockMovement, performed_by: UserId) -> Self {
        Self {
            id: TransactionId::new(),
            supply_id,
            kind: movement.kind,
            quantity: movement.delta,
            previous_quantity: movement.previous_quantity,
            new_quantity: movement.new_quantity,
            reason: movement.reason.clone(),
            performed_by,
            created_at: movement.occurred_at,
        }
    }
}
