//! Partner: the slice of a delivery worker's identity this core touches.

use crate::domain::PartnerId;
use serde::{Deserialize, Serialize};

/// Identity and registration are owned upstream; the ledger only reads the
/// city (for incentive scoping) and maintains the online flag and
/// current-shift reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    pub city: Option<String>,
    pub online: bool,
    pub current_shift_id: Option<i64>,
}
