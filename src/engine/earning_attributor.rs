//! Earning attribution: turning delivered orders into wallet credits.

use crate::config::EarningPolicy;
use crate::db::Repository;
use crate::domain::{
    BulkEarningItemResult, BulkEarningOutcome, BulkEarningReport, Earning, Money, OrderId,
    PartnerId, TimeMs, WalletTransaction,
};
use crate::error::AppError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct EarningAttributor {
    repo: Arc<Repository>,
    policy: EarningPolicy,
}

/// One entry of a bulk earning import.
#[derive(Debug, Clone, Deserialize)]
pub struct EarningInput {
    pub partner_id: PartnerId,
    pub order_id: OrderId,
    /// Overrides the computed fee when present.
    pub amount: Option<Money>,
}

impl EarningAttributor {
    pub fn new(repo: Arc<Repository>, policy: EarningPolicy) -> Self {
        Self { repo, policy }
    }

    /// Record the earning for a delivered order and credit the wallet.
    ///
    /// The order must exist, belong to the partner, and be delivered. The
    /// amount defaults to the fee policy applied to the order value; a
    /// duplicate signal for the same (partner, order) is a Conflict.
    pub async fn record_earning(
        &self,
        partner: &PartnerId,
        order_id: &OrderId,
        amount: Option<Money>,
    ) -> Result<Earning, AppError> {
        let order = self
            .repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {} not found", order_id)))?;

        if &order.partner_id != partner {
            return Err(AppError::Validation(format!(
                "order {} is not assigned to partner {}",
                order_id, partner
            )));
        }
        if !order.is_delivered() {
            return Err(AppError::Validation(format!(
                "order {} is not delivered",
                order_id
            )));
        }

        let amount = match amount {
            Some(a) if !a.is_positive() => {
                return Err(AppError::Validation(
                    "earning amount must be positive".to_string(),
                ));
            }
            Some(a) => a.round2(),
            None => self.policy.fee_for(order.order_value),
        };

        let delivered_at = order.delivered_at_ms.unwrap_or_else(TimeMs::now);
        let shift_id = self.repo.get_open_shift(partner).await?.map(|s| s.id);

        let credit = WalletTransaction::completed_credit(
            partner.clone(),
            amount,
            "Delivery earning",
            format!("Earning for order {}", order_id),
            Some(order_id.clone()),
            None,
            TimeMs::now(),
        );

        let earning = self
            .repo
            .insert_earning_with_credit(partner, order_id, amount, delivered_at, shift_id, &credit)
            .await?;

        info!(
            partner = %partner,
            order = %order_id,
            amount = %amount,
            "Earning recorded"
        );
        Ok(earning)
    }

    /// Record a batch of earnings. Items are independent: a duplicate is
    /// reported as skipped, any other failure as failed, and neither stops
    /// the rest of the batch.
    pub async fn bulk_record(&self, items: Vec<EarningInput>) -> Result<BulkEarningReport, AppError> {
        let mut report = BulkEarningReport {
            recorded: 0,
            skipped: 0,
            failed: 0,
            items: Vec::with_capacity(items.len()),
        };

        for item in items {
            let outcome = match self
                .record_earning(&item.partner_id, &item.order_id, item.amount)
                .await
            {
                Ok(earning) => {
                    report.recorded += 1;
                    BulkEarningOutcome::Recorded {
                        earning_id: earning.id,
                    }
                }
                Err(AppError::Conflict(reason)) => {
                    report.skipped += 1;
                    BulkEarningOutcome::Skipped { reason }
                }
                Err(e) => {
                    report.failed += 1;
                    BulkEarningOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.items.push(BulkEarningItemResult {
                order_id: item.order_id,
                outcome,
            });
        }

        Ok(report)
    }

    pub async fn earnings(
        &self,
        partner: &PartnerId,
        from_ms: Option<TimeMs>,
        to_ms: Option<TimeMs>,
    ) -> Result<Vec<Earning>, AppError> {
        self.repo.query_earnings(partner, from_ms, to_ms).await
    }
}
