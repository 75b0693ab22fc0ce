use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{Money, PartnerId, ReferralLink};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferralRequest {
    pub referrer_id: String,
    pub referee_id: String,
    pub required_deliveries: Option<i64>,
    pub referrer_reward: Option<String>,
    pub referee_reward: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralLinkResponse {
    pub referral_id: i64,
    pub referrer_id: String,
    pub referee_id: String,
    pub status: String,
    pub completed_deliveries: i64,
    pub required_deliveries: i64,
    pub referrer_reward: String,
    pub referee_reward: String,
    pub referrer_paid: bool,
    pub referee_paid: bool,
}

fn link_response(link: &ReferralLink) -> ReferralLinkResponse {
    ReferralLinkResponse {
        referral_id: link.id,
        referrer_id: link.referrer_id.as_str().to_string(),
        referee_id: link.referee_id.as_str().to_string(),
        status: link.status.as_str().to_string(),
        completed_deliveries: link.completed_deliveries,
        required_deliveries: link.required_deliveries,
        referrer_reward: link.referrer_reward.to_canonical_string(),
        referee_reward: link.referee_reward.to_canonical_string(),
        referrer_paid: link.referrer_paid,
        referee_paid: link.referee_paid,
    }
}

fn parse_reward(raw: Option<String>, field: &str) -> Result<Option<Money>, AppError> {
    raw.map(|s| {
        Money::from_str(&s)
            .map_err(|_| AppError::Validation(format!("{} must be a valid decimal", field)))
    })
    .transpose()
}

pub async fn create_referral(
    State(state): State<AppState>,
    Json(req): Json<CreateReferralRequest>,
) -> Result<Json<ReferralLinkResponse>, AppError> {
    let referrer = PartnerId::new(req.referrer_id);
    let referee = PartnerId::new(req.referee_id);
    let referrer_reward = parse_reward(req.referrer_reward, "referrerReward")?;
    let referee_reward = parse_reward(req.referee_reward, "refereeReward")?;

    let link = state
        .referrals
        .create_link(
            &referrer,
            &referee,
            req.required_deliveries,
            referrer_reward,
            referee_reward,
        )
        .await?;

    Ok(Json(link_response(&link)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCompletedRequest {
    pub referee_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryCompletedResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<ReferralLinkResponse>,
    pub advanced: bool,
}

pub async fn delivery_completed(
    State(state): State<AppState>,
    Json(req): Json<DeliveryCompletedRequest>,
) -> Result<Json<DeliveryCompletedResponse>, AppError> {
    let referee = PartnerId::new(req.referee_id);
    let progress = state.referrals.on_delivery_completed(&referee).await?;
    let advanced = progress.is_some();

    // Fully settled links no longer advance; still report their state.
    let link = match progress {
        Some(p) => Some(p.link),
        None => state.referrals.link_for_referee(&referee).await?,
    };

    Ok(Json(DeliveryCompletedResponse {
        advanced,
        link: link.as_ref().map(link_response),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStatsQuery {
    pub partner_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStatsResponse {
    pub partner_id: String,
    pub total_referred: i64,
    pub total_earned: String,
    pub pending_rewards: String,
}

pub async fn get_referral_stats(
    Query(params): Query<ReferralStatsQuery>,
    State(state): State<AppState>,
) -> Result<Json<ReferralStatsResponse>, AppError> {
    let partner = PartnerId::new(params.partner_id);
    let stats = state.referrals.stats(&partner).await?;

    Ok(Json(ReferralStatsResponse {
        partner_id: partner.as_str().to_string(),
        total_referred: stats.total_referred,
        total_earned: stats.total_earned.to_canonical_string(),
        pending_rewards: stats.pending_rewards.to_canonical_string(),
    }))
}
