//! Incentive rules and payout markers.

use super::{parse_money, wallet, Repository};
use crate::domain::{IncentivePayout, IncentiveRule, Money, PartnerId, TimeMs, WalletTransaction};
use crate::error::AppError;
use chrono::NaiveDate;
use sqlx::Row;

fn map_rule_row(row: sqlx::sqlite::SqliteRow) -> IncentiveRule {
    let bonus_str: String = row.get("bonus");
    let effective_str: String = row.get("effective_from");
    IncentiveRule {
        id: row.get("id"),
        effective_from: effective_str.parse().unwrap_or(NaiveDate::MIN),
        city: row.get("city"),
        min_orders: row.get("min_orders"),
        bonus: parse_money("incentive_rules.bonus", &bonus_str),
        active: row.get::<i64, _>("active") != 0,
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
    }
}

impl Repository {
    pub async fn insert_rule(
        &self,
        effective_from: NaiveDate,
        city: Option<&str>,
        min_orders: i64,
        bonus: Money,
        now: TimeMs,
    ) -> Result<IncentiveRule, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO incentive_rules (effective_from, city, min_orders, bonus, active, created_at_ms)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(effective_from.to_string())
        .bind(city)
        .bind(min_orders)
        .bind(bonus.to_canonical_string())
        .bind(now.as_ms())
        .execute(self.pool())
        .await?;

        Ok(IncentiveRule {
            id: result.last_insert_rowid(),
            effective_from,
            city: city.map(|s| s.to_string()),
            min_orders,
            bonus,
            active: true,
            created_at_ms: now,
        })
    }

    /// Soft-delete: rules are never hard-deleted so payout audits stay valid.
    pub async fn deactivate_rule(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE incentive_rules SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("incentive rule {} not found", id)));
        }
        Ok(())
    }

    pub async fn query_active_rules(&self) -> Result<Vec<IncentiveRule>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, effective_from, city, min_orders, bonus, active, created_at_ms
            FROM incentive_rules
            WHERE active = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(map_rule_row).collect())
    }

    pub async fn get_payout(
        &self,
        partner: &PartnerId,
        date: NaiveDate,
    ) -> Result<Option<IncentivePayout>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT id, partner_id, rule_id, payout_date, amount, transaction_id, created_at_ms
            FROM incentive_payouts
            WHERE partner_id = ? AND payout_date = ?
            "#,
        )
        .bind(partner.as_str())
        .bind(date.to_string())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|r| {
            let date_str: String = r.get("payout_date");
            let amount_str: String = r.get("amount");
            IncentivePayout {
                id: r.get("id"),
                partner_id: PartnerId::new(r.get::<String, _>("partner_id")),
                rule_id: r.get("rule_id"),
                payout_date: date_str.parse().unwrap_or(NaiveDate::MIN),
                amount: parse_money("incentive_payouts.amount", &amount_str),
                transaction_id: r.get("transaction_id"),
                created_at_ms: TimeMs::new(r.get("created_at_ms")),
            }
        }))
    }

    /// Record the payout marker, the bonus credit, and the wallet update in
    /// one transaction. If a marker already exists for (partner, day) the
    /// whole operation no-ops and returns None: two concurrent evaluations
    /// serialize on the UNIQUE constraint, and a retry is idempotent.
    pub async fn insert_payout_with_credit(
        &self,
        partner: &PartnerId,
        rule_id: i64,
        date: NaiveDate,
        credit: &WalletTransaction,
    ) -> Result<Option<IncentivePayout>, AppError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO incentive_payouts (partner_id, rule_id, payout_date, amount, transaction_id, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(partner_id, payout_date) DO NOTHING
            "#,
        )
        .bind(partner.as_str())
        .bind(rule_id)
        .bind(date.to_string())
        .bind(credit.amount.to_canonical_string())
        .bind(&credit.id)
        .bind(credit.created_at_ms.as_ms())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Already paid for this day; leave the ledger untouched.
            return Ok(None);
        }

        let payout_id = result.last_insert_rowid();

        wallet::insert_transaction(&mut tx, credit).await?;
        wallet::apply_completed_credit(&mut tx, partner, credit.amount, credit.created_at_ms)
            .await?;

        tx.commit().await?;

        Ok(Some(IncentivePayout {
            id: payout_id,
            partner_id: partner.clone(),
            rule_id,
            payout_date: date,
            amount: credit.amount,
            transaction_id: credit.id.clone(),
            created_at_ms: credit.created_at_ms,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use std::str::FromStr;

    fn bonus_credit(partner: &str, amount: &str, at: i64) -> WalletTransaction {
        WalletTransaction::completed_credit(
            PartnerId::new(partner),
            Money::from_str(amount).unwrap(),
            "Daily incentive",
            "",
            None,
            None,
            TimeMs::new(at),
        )
    }

    #[tokio::test]
    async fn test_rule_lifecycle() {
        let (repo, _temp) = setup_test_db().await;
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let rule = repo
            .insert_rule(date, Some("pune"), 3, Money::from_str("50").unwrap(), TimeMs::new(0))
            .await
            .unwrap();
        assert!(rule.active);

        assert_eq!(repo.query_active_rules().await.unwrap().len(), 1);

        repo.deactivate_rule(rule.id).await.unwrap();
        assert!(repo.query_active_rules().await.unwrap().is_empty());

        let err = repo.deactivate_rule(999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_payout_marker_is_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        let partner = PartnerId::new("p1");
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let rule = repo
            .insert_rule(date, None, 3, Money::from_str("50").unwrap(), TimeMs::new(0))
            .await
            .unwrap();

        let first = repo
            .insert_payout_with_credit(&partner, rule.id, date, &bonus_credit("p1", "50", 1000))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = repo
            .insert_payout_with_credit(&partner, rule.id, date, &bonus_credit("p1", "50", 2000))
            .await
            .unwrap();
        assert!(second.is_none());

        // Exactly one credit in the ledger.
        let txs = repo
            .query_transactions(&partner, None, None, 100)
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        let wallet = repo.get_wallet(&partner).await.unwrap().unwrap();
        assert_eq!(wallet.balance, Money::from_str("50").unwrap());
    }
}
