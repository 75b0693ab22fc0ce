//! Referral links and settlement progress.

use crate::domain::{Money, PartnerId, TimeMs};
use serde::{Deserialize, Serialize};

/// Lifecycle of a referral link. A link never regresses from Completed back
/// to Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Completed,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Pending => "pending",
            ReferralStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReferralStatus::Pending),
            "completed" => Some(ReferralStatus::Completed),
            _ => None,
        }
    }
}

/// A referrer/referee pair with progress toward a mutual reward. Each paid
/// flag pays at most once; the flags are checked and set in the same store
/// transaction as the corresponding credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralLink {
    pub id: i64,
    pub referrer_id: PartnerId,
    pub referee_id: PartnerId,
    pub status: ReferralStatus,
    pub completed_deliveries: i64,
    pub required_deliveries: i64,
    pub referrer_reward: Money,
    pub referee_reward: Money,
    pub referrer_paid: bool,
    pub referee_paid: bool,
    pub completed_at_ms: Option<TimeMs>,
    pub created_at_ms: TimeMs,
}

impl ReferralLink {
    /// True once the delivery threshold has been reached.
    pub fn threshold_reached(&self) -> bool {
        self.completed_deliveries >= self.required_deliveries
    }

    /// True while either side still has an unpaid reward on a completed link.
    pub fn has_unpaid_side(&self) -> bool {
        self.status == ReferralStatus::Completed && (!self.referrer_paid || !self.referee_paid)
    }
}

/// Result of advancing a referral on a referee delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralProgress {
    pub link: ReferralLink,
    /// Sides paid by this call (not historically).
    pub referrer_paid_now: bool,
    pub referee_paid_now: bool,
}

/// Aggregate referral view for a referrer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralStats {
    pub total_referred: i64,
    pub total_earned: Money,
    pub pending_rewards: Money,
}
