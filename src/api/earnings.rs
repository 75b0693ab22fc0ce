use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{
    BulkEarningReport, Earning, Money, OrderId, PartnerId, ReferralStatus, TimeMs,
};
use crate::engine::EarningInput;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEarningRequest {
    pub partner_id: String,
    pub order_id: String,
    /// Decimal string override; computed from the fee policy when absent.
    pub amount: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningDto {
    pub earning_id: i64,
    pub partner_id: String,
    pub order_id: String,
    pub amount: String,
    pub delivered_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_id: Option<i64>,
}

fn earning_dto(e: &Earning) -> EarningDto {
    EarningDto {
        earning_id: e.id,
        partner_id: e.partner_id.as_str().to_string(),
        order_id: e.order_id.as_str().to_string(),
        amount: e.amount.to_canonical_string(),
        delivered_at_ms: e.delivered_at_ms.as_ms(),
        shift_id: e.shift_id,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEarningResponse {
    pub earning: EarningDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral: Option<ReferralProgressDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralProgressDto {
    pub completed_deliveries: i64,
    pub required_deliveries: i64,
    pub completed: bool,
    pub rewards_settled_now: bool,
}

fn parse_amount(raw: Option<String>) -> Result<Option<Money>, AppError> {
    raw.map(|s| {
        Money::from_str(&s)
            .map_err(|_| AppError::Validation("amount must be a valid decimal".into()))
    })
    .transpose()
}

/// The "order delivered" signal: records the earning (idempotent per
/// (partner, order)), then advances referral progress for the partner.
pub async fn record_earning(
    State(state): State<AppState>,
    Json(req): Json<RecordEarningRequest>,
) -> Result<Json<RecordEarningResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let order = OrderId::new(req.order_id);
    let amount = parse_amount(req.amount)?;

    let earning = state.earnings.record_earning(&partner, &order, amount).await?;
    let referral = state.referrals.on_delivery_completed(&partner).await?;

    Ok(Json(RecordEarningResponse {
        earning: earning_dto(&earning),
        referral: referral.map(|p| ReferralProgressDto {
            completed_deliveries: p.link.completed_deliveries,
            required_deliveries: p.link.required_deliveries,
            completed: p.link.status == ReferralStatus::Completed,
            rewards_settled_now: p.referrer_paid_now || p.referee_paid_now,
        }),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEarningsRequest {
    pub items: Vec<BulkEarningItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEarningItem {
    pub partner_id: String,
    pub order_id: String,
    pub amount: Option<String>,
}

pub async fn bulk_record_earnings(
    State(state): State<AppState>,
    Json(req): Json<BulkEarningsRequest>,
) -> Result<Json<BulkEarningReport>, AppError> {
    let mut inputs = Vec::with_capacity(req.items.len());
    for item in req.items {
        inputs.push(EarningInput {
            partner_id: PartnerId::new(item.partner_id),
            order_id: OrderId::new(item.order_id),
            amount: parse_amount(item.amount)?,
        });
    }

    let report = state.earnings.bulk_record(inputs).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsQuery {
    pub partner_id: String,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsResponse {
    pub total_amount: String,
    pub earning_count: i64,
    pub earnings: Vec<EarningDto>,
}

pub async fn get_earnings(
    Query(params): Query<EarningsQuery>,
    State(state): State<AppState>,
) -> Result<Json<EarningsResponse>, AppError> {
    let partner = PartnerId::new(params.partner_id);
    let from_ms = params.from_ms.map(TimeMs::new);
    let to_ms = params.to_ms.map(TimeMs::new);
    if let (Some(from_ms), Some(to_ms)) = (from_ms, to_ms) {
        if from_ms > to_ms {
            return Err(AppError::Validation("fromMs must be <= toMs".into()));
        }
    }

    let earnings = state.earnings.earnings(&partner, from_ms, to_ms).await?;

    let mut total = Money::zero();
    for e in &earnings {
        total = total + e.amount;
    }

    Ok(Json(EarningsResponse {
        total_amount: total.to_canonical_string(),
        earning_count: earnings.len() as i64,
        earnings: earnings.iter().map(earning_dto).collect(),
    }))
}
