//! Incentive rules and payout markers.

use crate::domain::{Money, PartnerId, TimeMs};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A standing offer: complete at least `min_orders` deliveries in a day and
/// receive `bonus`. Optionally scoped to a city. Immutable once created
/// except for deactivation; rules are never hard-deleted so historical
/// payouts stay auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveRule {
    pub id: i64,
    pub effective_from: NaiveDate,
    pub city: Option<String>,
    pub min_orders: i64,
    pub bonus: Money,
    pub active: bool,
    pub created_at_ms: TimeMs,
}

impl IncentiveRule {
    /// Whether this rule is in force for a partner on a given day.
    pub fn applies(&self, date: NaiveDate, partner_city: Option<&str>) -> bool {
        self.active
            && self.effective_from <= date
            && match self.city.as_deref() {
                None => true,
                Some(city) => partner_city == Some(city),
            }
    }
}

/// Pick the single best rule for a delivery count: highest bonus wins,
/// ties broken by the higher threshold, then the lower id.
pub fn best_rule<'a>(rules: &'a [IncentiveRule], delivery_count: i64) -> Option<&'a IncentiveRule> {
    rules
        .iter()
        .filter(|r| r.min_orders <= delivery_count)
        .max_by(|a, b| {
            a.bonus
                .cmp(&b.bonus)
                .then(a.min_orders.cmp(&b.min_orders))
                .then(b.id.cmp(&a.id))
        })
}

/// Record of a rule being satisfied and paid for a partner and day.
/// At most one payout marker exists per (partner, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentivePayout {
    pub id: i64,
    pub partner_id: PartnerId,
    pub rule_id: i64,
    pub payout_date: NaiveDate,
    pub amount: Money,
    pub transaction_id: String,
    pub created_at_ms: TimeMs,
}

/// Read-only progress view against one applicable rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleProgress {
    pub rule_id: i64,
    pub min_orders: i64,
    pub bonus: Money,
    pub city: Option<String>,
    pub delivery_count: i64,
    pub orders_remaining: i64,
    pub eligible: bool,
}
