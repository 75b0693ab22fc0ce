//! Earning: one delivery's monetary attribution.

use crate::domain::{Money, OrderId, PartnerId, TimeMs};
use serde::{Deserialize, Serialize};

/// The credit attributed to one completed delivery. At most one earning may
/// exist per (partner, order); the store enforces this so duplicate
/// delivered signals cannot double-credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earning {
    pub id: i64,
    pub partner_id: PartnerId,
    pub order_id: OrderId,
    pub amount: Money,
    pub delivered_at_ms: TimeMs,
    /// Shift that was open when the delivery completed, if any.
    pub shift_id: Option<i64>,
}

/// Outcome of one item in a bulk earning import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", rename_all_fields = "camelCase", tag = "outcome")]
pub enum BulkEarningOutcome {
    Recorded { earning_id: i64 },
    /// Already recorded for this (partner, order); not an error in a batch.
    Skipped { reason: String },
    Failed { reason: String },
}

/// Per-item report plus aggregate counts for a bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEarningReport {
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<BulkEarningItemResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEarningItemResult {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub outcome: BulkEarningOutcome,
}
