//! Domain primitives: PartnerId, OrderId, TimeMs, GeoPoint.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// The UTC calendar date this instant falls on.
    pub fn utc_date(&self) -> NaiveDate {
        Utc.timestamp_millis_opt(self.0)
            .single()
            .map(|dt: DateTime<Utc>| dt.date_naive())
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Half-open [start, end) millisecond window covering one UTC calendar day.
pub fn day_window(date: NaiveDate) -> (TimeMs, TimeMs) {
    let start = date.and_hms_opt(0, 0, 0).expect("midnight always exists");
    let start_ms = Utc.from_utc_datetime(&start).timestamp_millis();
    (TimeMs::new(start_ms), TimeMs::new(start_ms + 86_400_000))
}

/// Identity of a delivery partner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartnerId(pub String);

impl PartnerId {
    /// Create a PartnerId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        PartnerId(id.into())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a delivery order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Create an OrderId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        OrderId(id.into())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Advisory geo coordinates attached to shift start/end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}
