//! Referral links and settlement.

use super::{parse_money, wallet, Repository};
use crate::domain::{
    Money, PartnerId, ReferralLink, ReferralProgress, ReferralStats, ReferralStatus, TimeMs,
    TxStatus, TxType, WalletTransaction,
};
use crate::error::{is_unique_violation, AppError};
use sqlx::Row;

fn map_link_row(row: sqlx::sqlite::SqliteRow) -> ReferralLink {
    let status_str: String = row.get("status");
    ReferralLink {
        id: row.get("id"),
        referrer_id: PartnerId::new(row.get::<String, _>("referrer_id")),
        referee_id: PartnerId::new(row.get::<String, _>("referee_id")),
        status: ReferralStatus::parse(&status_str).unwrap_or(ReferralStatus::Pending),
        completed_deliveries: row.get("completed_deliveries"),
        required_deliveries: row.get("required_deliveries"),
        referrer_reward: parse_money(
            "referral_links.referrer_reward",
            &row.get::<String, _>("referrer_reward"),
        ),
        referee_reward: parse_money(
            "referral_links.referee_reward",
            &row.get::<String, _>("referee_reward"),
        ),
        referrer_paid: row.get::<i64, _>("referrer_paid") != 0,
        referee_paid: row.get::<i64, _>("referee_paid") != 0,
        completed_at_ms: row.get::<Option<i64>, _>("completed_at_ms").map(TimeMs::new),
        created_at_ms: TimeMs::new(row.get("created_at_ms")),
    }
}

const LINK_COLUMNS: &str = "id, referrer_id, referee_id, status, completed_deliveries, \
     required_deliveries, referrer_reward, referee_reward, referrer_paid, referee_paid, \
     completed_at_ms, created_at_ms";

impl Repository {
    /// Create a referral link. A referee can be referred at most once,
    /// ever; a duplicate is a Conflict.
    pub async fn insert_referral_link(
        &self,
        referrer: &PartnerId,
        referee: &PartnerId,
        required_deliveries: i64,
        referrer_reward: Money,
        referee_reward: Money,
        now: TimeMs,
    ) -> Result<ReferralLink, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO referral_links (
                referrer_id, referee_id, status, completed_deliveries, required_deliveries,
                referrer_reward, referee_reward, referrer_paid, referee_paid, created_at_ms
            ) VALUES (?, ?, 'pending', 0, ?, ?, ?, 0, 0, ?)
            "#,
        )
        .bind(referrer.as_str())
        .bind(referee.as_str())
        .bind(required_deliveries)
        .bind(referrer_reward.to_canonical_string())
        .bind(referee_reward.to_canonical_string())
        .bind(now.as_ms())
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("partner {} already has a referral link", referee))
            } else {
                e.into()
            }
        })?;

        Ok(ReferralLink {
            id: result.last_insert_rowid(),
            referrer_id: referrer.clone(),
            referee_id: referee.clone(),
            status: ReferralStatus::Pending,
            completed_deliveries: 0,
            required_deliveries,
            referrer_reward,
            referee_reward,
            referrer_paid: false,
            referee_paid: false,
            completed_at_ms: None,
            created_at_ms: now,
        })
    }

    pub async fn get_link_by_referee(
        &self,
        referee: &PartnerId,
    ) -> Result<Option<ReferralLink>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM referral_links WHERE referee_id = ?",
            LINK_COLUMNS
        ))
        .bind(referee.as_str())
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(map_link_row))
    }

    /// Advance referral progress on a referee delivery and settle rewards.
    ///
    /// Everything happens in one transaction: the progress increment, the
    /// completion flip, and each side's credit together with its paid flag.
    /// A crash or a concurrent re-entrant call therefore cannot pay a side
    /// twice, and a retry resumes only the unpaid side. Returns None when
    /// no link needs work (no link, or completed and fully paid).
    pub async fn advance_referral(
        &self,
        referee: &PartnerId,
        now: TimeMs,
    ) -> Result<Option<ReferralProgress>, AppError> {
        let mut tx = self.pool().begin().await?;

        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM referral_links
            WHERE referee_id = ?
              AND (status = 'pending' OR referrer_paid = 0 OR referee_paid = 0)
            "#,
            LINK_COLUMNS
        ))
        .bind(referee.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut link) = row.map(map_link_row) else {
            return Ok(None);
        };

        if link.status == ReferralStatus::Pending {
            link.completed_deliveries += 1;
            if link.threshold_reached() {
                link.status = ReferralStatus::Completed;
                link.completed_at_ms = Some(now);
            }
        }

        let mut referrer_paid_now = false;
        let mut referee_paid_now = false;

        if link.has_unpaid_side() {
            if !link.referrer_paid {
                let credit = WalletTransaction::completed_credit(
                    link.referrer_id.clone(),
                    link.referrer_reward,
                    "Referral bonus",
                    format!("Referral of partner {} completed", link.referee_id),
                    None,
                    Some(link.id),
                    now,
                );
                wallet::insert_transaction(&mut tx, &credit).await?;
                wallet::apply_completed_credit(&mut tx, &link.referrer_id, credit.amount, now)
                    .await?;
                link.referrer_paid = true;
                referrer_paid_now = true;
            }
            if !link.referee_paid {
                let credit = WalletTransaction::completed_credit(
                    link.referee_id.clone(),
                    link.referee_reward,
                    "Referral joining bonus",
                    format!("Referred by partner {}", link.referrer_id),
                    None,
                    Some(link.id),
                    now,
                );
                wallet::insert_transaction(&mut tx, &credit).await?;
                wallet::apply_completed_credit(&mut tx, &link.referee_id, credit.amount, now)
                    .await?;
                link.referee_paid = true;
                referee_paid_now = true;
            }
        }

        sqlx::query(
            r#"
            UPDATE referral_links
            SET status = ?, completed_deliveries = ?, referrer_paid = ?, referee_paid = ?, completed_at_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(link.status.as_str())
        .bind(link.completed_deliveries)
        .bind(link.referrer_paid as i64)
        .bind(link.referee_paid as i64)
        .bind(link.completed_at_ms.map(|t| t.as_ms()))
        .bind(link.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(ReferralProgress {
            link,
            referrer_paid_now,
            referee_paid_now,
        }))
    }

    /// Aggregate referral view for a referrer: links created, referral
    /// credits actually received, and rewards still pending on open links.
    pub async fn referral_stats(&self, referrer: &PartnerId) -> Result<ReferralStats, AppError> {
        let total_referred: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM referral_links WHERE referrer_id = ?")
                .bind(referrer.as_str())
                .fetch_one(self.pool())
                .await?;

        let earned_rows = sqlx::query(
            r#"
            SELECT amount FROM wallet_transactions
            WHERE partner_id = ? AND referral_id IS NOT NULL AND tx_type = ? AND status = ?
            "#,
        )
        .bind(referrer.as_str())
        .bind(TxType::Credit.as_str())
        .bind(TxStatus::Completed.as_str())
        .fetch_all(self.pool())
        .await?;

        let mut total_earned = Money::zero();
        for row in earned_rows {
            total_earned = total_earned
                + parse_money("wallet_transactions.amount", &row.get::<String, _>("amount"));
        }

        let pending_rows = sqlx::query(
            r#"
            SELECT referrer_reward FROM referral_links
            WHERE referrer_id = ? AND referrer_paid = 0
            "#,
        )
        .bind(referrer.as_str())
        .fetch_all(self.pool())
        .await?;

        let mut pending_rewards = Money::zero();
        for row in pending_rows {
            pending_rewards = pending_rewards
                + parse_money(
                    "referral_links.referrer_reward",
                    &row.get::<String, _>("referrer_reward"),
                );
        }

        Ok(ReferralStats {
            total_referred: total_referred.0,
            total_earned,
            pending_rewards,
        })
    }
}
