//! Referral links: creation, progress on deliveries, reward settlement.

use crate::config::ReferralPolicy;
use crate::db::Repository;
use crate::domain::{Money, PartnerId, ReferralLink, ReferralProgress, ReferralStats, TimeMs};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ReferralSettlement {
    repo: Arc<Repository>,
    policy: ReferralPolicy,
}

impl ReferralSettlement {
    pub fn new(repo: Arc<Repository>, policy: ReferralPolicy) -> Self {
        Self { repo, policy }
    }

    /// Create a referral link, filling unset parameters from the configured
    /// policy. A referee can be referred at most once.
    pub async fn create_link(
        &self,
        referrer: &PartnerId,
        referee: &PartnerId,
        required_deliveries: Option<i64>,
        referrer_reward: Option<Money>,
        referee_reward: Option<Money>,
    ) -> Result<ReferralLink, AppError> {
        if referrer == referee {
            return Err(AppError::Validation(
                "a partner cannot refer themselves".to_string(),
            ));
        }

        let required = required_deliveries.unwrap_or(self.policy.required_deliveries);
        if required <= 0 {
            return Err(AppError::Validation(
                "required_deliveries must be positive".to_string(),
            ));
        }

        let referrer_reward = referrer_reward.unwrap_or(self.policy.referrer_reward);
        let referee_reward = referee_reward.unwrap_or(self.policy.referee_reward);
        if !referrer_reward.is_positive() || !referee_reward.is_positive() {
            return Err(AppError::Validation(
                "referral rewards must be positive".to_string(),
            ));
        }

        let link = self
            .repo
            .insert_referral_link(
                referrer,
                referee,
                required,
                referrer_reward,
                referee_reward,
                TimeMs::now(),
            )
            .await?;

        info!(
            referrer = %referrer,
            referee = %referee,
            required_deliveries = required,
            "Referral link created"
        );
        Ok(link)
    }

    /// Advance the referee's referral on a completed delivery, settling
    /// rewards when the threshold is reached. A referee without a link is a
    /// no-op, not an error.
    pub async fn on_delivery_completed(
        &self,
        referee: &PartnerId,
    ) -> Result<Option<ReferralProgress>, AppError> {
        let progress = self.repo.advance_referral(referee, TimeMs::now()).await?;

        if let Some(p) = &progress {
            if p.referrer_paid_now || p.referee_paid_now {
                info!(
                    referee = %referee,
                    referrer = %p.link.referrer_id,
                    "Referral rewards settled"
                );
            }
        }

        Ok(progress)
    }

    pub async fn link_for_referee(
        &self,
        referee: &PartnerId,
    ) -> Result<Option<ReferralLink>, AppError> {
        self.repo.get_link_by_referee(referee).await
    }

    pub async fn stats(&self, referrer: &PartnerId) -> Result<ReferralStats, AppError> {
        self.repo.referral_stats(referrer).await
    }
}
