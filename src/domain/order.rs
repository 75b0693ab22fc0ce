//! Delivery order with an explicit, forward-only status machine.
//!
//! Order fulfilment itself is an upstream concern; the ledger only needs to
//! know which partner an order belongs to, its value, and whether it has
//! actually been delivered. Status is an explicit enum rather than a set of
//! nullable timestamps, and transitions only move forward.

use crate::domain::{Money, OrderId, PartnerId, TimeMs};
use serde::{Deserialize, Serialize};

/// Fulfilment stage of a delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Assigned,
    PickedUp,
    Shipped,
    Delivered,
}

impl OrderStatus {
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Placed => 0,
            OrderStatus::Assigned => 1,
            OrderStatus::PickedUp => 2,
            OrderStatus::Shipped => 3,
            OrderStatus::Delivered => 4,
        }
    }

    /// Transitions may skip stages but never move sideways or backward.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Assigned => "assigned",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "placed" => Some(OrderStatus::Placed),
            "assigned" => Some(OrderStatus::Assigned),
            "picked_up" => Some(OrderStatus::PickedUp),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The slice of an order the ledger cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: OrderId,
    pub partner_id: PartnerId,
    pub order_value: Money,
    pub status: OrderStatus,
    pub placed_at_ms: TimeMs,
    pub delivered_at_ms: Option<TimeMs>,
}

impl DeliveryOrder {
    pub fn is_delivered(&self) -> bool {
        self.status == OrderStatus::Delivered
    }
}
