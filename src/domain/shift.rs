//! Shift: one continuous online interval for a partner.

use crate::domain::{GeoPoint, PartnerId, TimeMs};
use serde::{Deserialize, Serialize};

/// A single online interval. At most one shift per partner may be open
/// (end_ms = None) at any moment; the store enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    pub partner_id: PartnerId,
    pub start_ms: TimeMs,
    pub end_ms: Option<TimeMs>,
    pub start_location: Option<GeoPoint>,
    pub end_location: Option<GeoPoint>,
}

impl Shift {
    /// Returns true if the shift has not been closed yet.
    pub fn is_open(&self) -> bool {
        self.end_ms.is_none()
    }

    /// Elapsed duration in milliseconds; an open shift contributes its
    /// elapsed-so-far time up to `now`.
    pub fn duration_ms(&self, now: TimeMs) -> i64 {
        let end = self.end_ms.unwrap_or(now).as_ms().min(now.as_ms());
        (end - self.start_ms.as_ms()).max(0)
    }
}

/// Aggregate login-duration view for a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftStats {
    pub today_ms: i64,
    pub week_ms: i64,
    pub month_ms: i64,
    pub shift_count: i64,
}
