//! Per-delivery earning attribution.

use super::{parse_money, wallet, Repository};
use crate::domain::{Earning, Money, OrderId, PartnerId, TimeMs, WalletTransaction};
use crate::error::{is_unique_violation, AppError};
use sqlx::Row;

fn map_earning_row(row: sqlx::sqlite::SqliteRow) -> Earning {
    let amount_str: String = row.get("amount");
    Earning {
        id: row.get("id"),
        partner_id: PartnerId::new(row.get::<String, _>("partner_id")),
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        amount: parse_money("earnings.amount", &amount_str),
        delivered_at_ms: TimeMs::new(row.get("delivered_at_ms")),
        shift_id: row.get("shift_id"),
    }
}

impl Repository {
    /// Persist an earning and its Completed credit atomically. The
    /// UNIQUE(partner_id, order_id) constraint turns a racing duplicate
    /// delivered signal into a Conflict; nothing from the losing writer is
    /// committed.
    pub async fn insert_earning_with_credit(
        &self,
        partner: &PartnerId,
        order: &OrderId,
        amount: Money,
        delivered_at: TimeMs,
        shift_id: Option<i64>,
        credit: &WalletTransaction,
    ) -> Result<Earning, AppError> {
        let mut tx = self.pool().begin().await?;

        let delivered_on = delivered_at.utc_date().to_string();
        let result = sqlx::query(
            r#"
            INSERT INTO earnings (partner_id, order_id, amount, delivered_at_ms, delivered_on, shift_id, transaction_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(partner.as_str())
        .bind(order.as_str())
        .bind(amount.to_canonical_string())
        .bind(delivered_at.as_ms())
        .bind(&delivered_on)
        .bind(shift_id)
        .bind(&credit.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "earning already recorded for partner {} order {}",
                    partner, order
                ))
            } else {
                e.into()
            }
        })?;

        let earning_id = result.last_insert_rowid();

        wallet::insert_transaction(&mut tx, credit).await?;
        wallet::apply_completed_credit(&mut tx, partner, credit.amount, credit.created_at_ms)
            .await?;

        tx.commit().await?;

        Ok(Earning {
            id: earning_id,
            partner_id: partner.clone(),
            order_id: order.clone(),
            amount,
            delivered_at_ms: delivered_at,
            shift_id,
        })
    }

    pub async fn get_earning(
        &self,
        partner: &PartnerId,
        order: &OrderId,
    ) -> Result<Option<Earning>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, partner_id, order_id, amount, delivered_at_ms, shift_id
            FROM earnings
            WHERE partner_id = ? AND order_id = ?
            "#,
        )
        .bind(partner.as_str())
        .bind(order.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(map_earning_row))
    }

    /// Deliveries recorded for a partner on a UTC calendar day.
    pub async fn count_earnings_on(
        &self,
        partner: &PartnerId,
        date: chrono::NaiveDate,
    ) -> Result<i64, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM earnings WHERE partner_id = ? AND delivered_on = ?",
        )
        .bind(partner.as_str())
        .bind(date.to_string())
        .fetch_one(self.pool())
        .await?;

        Ok(row.get("n"))
    }

    pub async fn query_earnings(
        &self,
        partner: &PartnerId,
        from_ms: Option<TimeMs>,
        to_ms: Option<TimeMs>,
    ) -> Result<Vec<Earning>, AppError> {
        let from_ms = from_ms.unwrap_or(TimeMs::new(0)).as_ms();
        let to_ms = to_ms.unwrap_or(TimeMs::new(i64::MAX)).as_ms();

        let rows = sqlx::query(
            r#"
            SELECT id, partner_id, order_id, amount, delivered_at_ms, shift_id
            FROM earnings
            WHERE partner_id = ? AND delivered_at_ms >= ? AND delivered_at_ms <= ?
            ORDER BY delivered_at_ms ASC, id ASC
            "#,
        )
        .bind(partner.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(map_earning_row).collect())
    }

    /// Partners with at least one earning on a day, for the daily sweep.
    pub async fn partners_with_earnings_on(
        &self,
        date: chrono::NaiveDate,
    ) -> Result<Vec<PartnerId>, AppError> {
        let rows = sqlx::query(
            "SELECT DISTINCT partner_id FROM earnings WHERE delivered_on = ? ORDER BY partner_id",
        )
        .bind(date.to_string())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PartnerId::new(r.get::<String, _>("partner_id")))
            .collect())
    }
}
