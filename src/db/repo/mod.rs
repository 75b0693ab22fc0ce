//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `shifts.rs` - shift open/close and duration queries
//! - `earnings.rs` - per-delivery earning attribution
//! - `incentives.rs` - incentive rules and payout markers
//! - `referrals.rs` - referral links and settlement
//! - `wallet.rs` - wallet transactions, balances, withdrawals
//!
//! Every multi-step ledger mutation is composed inside a single sqlx
//! transaction here, so a partial application (e.g. an earning without its
//! credit) is never observable.

mod earnings;
mod incentives;
mod referrals;
mod shifts;
mod wallet;

use crate::domain::{DeliveryOrder, Money, OrderId, OrderStatus, Partner, PartnerId, TimeMs};
use crate::error::AppError;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

/// Parse a stored canonical decimal, logging and defaulting to zero on a
/// malformed row rather than failing the whole query.
pub(crate) fn parse_money(context: &str, raw: &str) -> Money {
    Money::from_str(raw).unwrap_or_else(|e| {
        warn!(
            context = context,
            amount = %raw,
            error = %e,
            "Failed to parse stored decimal, using zero"
        );
        Money::zero()
    })
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Connectivity probe for readiness checks.
    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Partner operations
    // =========================================================================

    /// Register a partner row if absent. Returns true if newly created.
    pub async fn upsert_partner(
        &self,
        id: &PartnerId,
        city: Option<&str>,
        now: TimeMs,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO partners (id, city, online, current_shift_id, created_at_ms)
            VALUES (?, ?, 0, NULL, ?)
            ON CONFLICT(id) DO UPDATE SET city = COALESCE(excluded.city, partners.city)
            "#,
        )
        .bind(id.as_str())
        .bind(city)
        .bind(now.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_partner(&self, id: &PartnerId) -> Result<Option<Partner>, AppError> {
        let row = sqlx::query(
            "SELECT id, city, online, current_shift_id FROM partners WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Partner {
            id: PartnerId::new(r.get::<String, _>("id")),
            city: r.get("city"),
            online: r.get::<i64, _>("online") != 0,
            current_shift_id: r.get("current_shift_id"),
        }))
    }

    // =========================================================================
    // Delivery order operations
    // =========================================================================

    /// Insert an order idempotently. Returns true if newly created.
    pub async fn insert_order(&self, order: &DeliveryOrder) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO delivery_orders (id, partner_id, order_value, status, placed_at_ms, delivered_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.partner_id.as_str())
        .bind(order.order_value.to_canonical_string())
        .bind(order.status.as_str())
        .bind(order.placed_at_ms.as_ms())
        .bind(order.delivered_at_ms.map(|t| t.as_ms()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_order(&self, id: &OrderId) -> Result<Option<DeliveryOrder>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, partner_id, order_value, status, placed_at_ms, delivered_at_ms
            FROM delivery_orders
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_order_row))
    }

    /// Advance an order's status. Backward or same-rank moves are rejected
    /// with a Conflict; the check and the update share one transaction.
    pub async fn update_order_status(
        &self,
        id: &OrderId,
        next: OrderStatus,
        now: TimeMs,
    ) -> Result<DeliveryOrder, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, partner_id, order_value, status, placed_at_ms, delivered_at_ms
            FROM delivery_orders
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let mut order = row
            .map(map_order_row)
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", id)))?;

        if !order.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "order {} cannot move from {} to {}",
                id, order.status, next
            )));
        }

        let delivered_at_ms = if next == OrderStatus::Delivered {
            Some(now)
        } else {
            order.delivered_at_ms
        };

        sqlx::query("UPDATE delivery_orders SET status = ?, delivered_at_ms = ? WHERE id = ?")
            .bind(next.as_str())
            .bind(delivered_at_ms.map(|t| t.as_ms()))
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        order.status = next;
        order.delivered_at_ms = delivered_at_ms;
        Ok(order)
    }
}

fn map_order_row(row: sqlx::sqlite::SqliteRow) -> DeliveryOrder {
    let value_str: String = row.get("order_value");
    let status_str: String = row.get("status");
    DeliveryOrder {
        id: OrderId::new(row.get::<String, _>("id")),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        order_value: parse_money("delivery_orders.order_value", &value_str),
        status: OrderStatus::parse(&status_str).unwrap_or(OrderStatus::Placed),
        placed_at_ms: TimeMs::new(row.get("placed_at_ms")),
        delivered_at_ms: row
            .get::<Option<i64>, _>("delivered_at_ms")
            .map(TimeMs::new),
    }
}
