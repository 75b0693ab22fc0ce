//! Incentive evaluation: rule selection, at-most-once payout, daily sweep.

use crate::db::Repository;
use crate::domain::{
    best_rule, IncentivePayout, IncentiveRule, Money, PartnerId, RuleProgress, TimeMs,
    WalletTransaction,
};
use crate::error::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct IncentiveEvaluator {
    repo: Arc<Repository>,
}

/// Outcome of a daily sweep; per-partner failures never abort siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub evaluated: usize,
    pub paid: usize,
    pub failed: usize,
}

impl IncentiveEvaluator {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn create_rule(
        &self,
        effective_from: NaiveDate,
        city: Option<&str>,
        min_orders: i64,
        bonus: Money,
    ) -> Result<IncentiveRule, AppError> {
        if min_orders <= 0 {
            return Err(AppError::Validation(
                "min_orders must be positive".to_string(),
            ));
        }
        if !bonus.is_positive() {
            return Err(AppError::Validation("bonus must be positive".to_string()));
        }
        self.repo
            .insert_rule(effective_from, city, min_orders, bonus, TimeMs::now())
            .await
    }

    pub async fn deactivate_rule(&self, id: i64) -> Result<(), AppError> {
        self.repo.deactivate_rule(id).await
    }

    /// Evaluate a partner's day and pay the single best qualifying rule.
    ///
    /// Not qualifying is a no-op, never an error. Retries are idempotent:
    /// the payout marker is unique per (partner, day), so a second call (or
    /// a concurrent one) returns None without touching the ledger.
    pub async fn evaluate_and_pay(
        &self,
        partner: &PartnerId,
        date: NaiveDate,
    ) -> Result<Option<IncentivePayout>, AppError> {
        let delivery_count = self.repo.count_earnings_on(partner, date).await?;
        if delivery_count == 0 {
            return Ok(None);
        }

        let city = self
            .repo
            .get_partner(partner)
            .await?
            .and_then(|p| p.city);

        let rules = self.repo.query_active_rules().await?;
        let applicable: Vec<IncentiveRule> = rules
            .into_iter()
            .filter(|r| r.applies(date, city.as_deref()))
            .collect();

        let Some(rule) = best_rule(&applicable, delivery_count) else {
            return Ok(None);
        };

        let credit = WalletTransaction::completed_credit(
            partner.clone(),
            rule.bonus,
            "Daily incentive",
            format!(
                "{} deliveries on {} met rule #{} (min {})",
                delivery_count, date, rule.id, rule.min_orders
            ),
            None,
            None,
            TimeMs::now(),
        );

        let payout = self
            .repo
            .insert_payout_with_credit(partner, rule.id, date, &credit)
            .await?;

        if let Some(p) = &payout {
            info!(
                partner = %partner,
                rule_id = p.rule_id,
                amount = %p.amount,
                date = %date,
                "Incentive payout recorded"
            );
        }

        Ok(payout)
    }

    /// Read-only progress view for every rule applicable to the partner
    /// today; never mutates state.
    pub async fn available_incentives(
        &self,
        partner: &PartnerId,
    ) -> Result<Vec<RuleProgress>, AppError> {
        let today = TimeMs::now().utc_date();
        let delivery_count = self.repo.count_earnings_on(partner, today).await?;
        let city = self
            .repo
            .get_partner(partner)
            .await?
            .and_then(|p| p.city);

        let rules = self.repo.query_active_rules().await?;
        Ok(rules
            .into_iter()
            .filter(|r| r.applies(today, city.as_deref()))
            .map(|r| RuleProgress {
                rule_id: r.id,
                min_orders: r.min_orders,
                bonus: r.bonus,
                city: r.city,
                delivery_count,
                orders_remaining: (r.min_orders - delivery_count).max(0),
                eligible: delivery_count >= r.min_orders,
            })
            .collect())
    }

    /// Sweep every partner with at least one earning on `date`. Used both
    /// as the periodic retry net for evaluations that failed at shift end
    /// and as the end-of-day batch.
    pub async fn process_daily_incentives(&self, date: NaiveDate) -> Result<SweepReport, AppError> {
        let partners = self.repo.partners_with_earnings_on(date).await?;
        let mut report = SweepReport {
            evaluated: 0,
            paid: 0,
            failed: 0,
        };

        for partner in partners {
            report.evaluated += 1;
            match self.evaluate_and_pay(&partner, date).await {
                Ok(Some(_)) => report.paid += 1,
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(partner = %partner, date = %date, error = %e, "Incentive sweep item failed");
                }
            }
        }

        Ok(report)
    }
}
