use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{IncentivePayout, IncentiveRule, Money, PartnerId, TimeMs};
use crate::engine::SweepReport;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    /// ISO date, e.g. "2026-08-01".
    pub effective_from: String,
    pub city: Option<String>,
    pub min_orders: i64,
    pub bonus: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    pub rule_id: i64,
    pub effective_from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub min_orders: i64,
    pub bonus: String,
    pub active: bool,
}

fn rule_response(rule: &IncentiveRule) -> RuleResponse {
    RuleResponse {
        rule_id: rule.id,
        effective_from: rule.effective_from.to_string(),
        city: rule.city.clone(),
        min_orders: rule.min_orders,
        bonus: rule.bonus.to_canonical_string(),
        active: rule.active,
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::from_str(raw)
        .map_err(|_| AppError::Validation(format!("{} must be an ISO date (YYYY-MM-DD)", field)))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<Json<RuleResponse>, AppError> {
    let effective_from = parse_date(&req.effective_from, "effectiveFrom")?;
    let bonus = Money::from_str(&req.bonus)
        .map_err(|_| AppError::Validation("bonus must be a valid decimal".into()))?;

    let rule = state
        .incentives
        .create_rule(effective_from, req.city.as_deref(), req.min_orders, bonus)
        .await?;

    Ok(Json(rule_response(&rule)))
}

pub async fn deactivate_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.incentives.deactivate_rule(rule_id).await?;
    Ok(Json(serde_json::json!({"ruleId": rule_id, "active": false})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableIncentivesQuery {
    pub partner_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleProgressDto {
    pub rule_id: i64,
    pub min_orders: i64,
    pub bonus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub delivery_count: i64,
    pub orders_remaining: i64,
    pub eligible: bool,
}

pub async fn get_available_incentives(
    Query(params): Query<AvailableIncentivesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<RuleProgressDto>>, AppError> {
    let partner = PartnerId::new(params.partner_id);
    let rows = state.incentives.available_incentives(&partner).await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| RuleProgressDto {
                rule_id: r.rule_id,
                min_orders: r.min_orders,
                bonus: r.bonus.to_canonical_string(),
                city: r.city,
                delivery_count: r.delivery_count,
                orders_remaining: r.orders_remaining,
                eligible: r.eligible,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub partner_id: String,
    /// Defaults to today (UTC).
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDto {
    pub payout_id: i64,
    pub partner_id: String,
    pub rule_id: i64,
    pub payout_date: String,
    pub amount: String,
    pub transaction_id: String,
}

fn payout_dto(p: &IncentivePayout) -> PayoutDto {
    PayoutDto {
        payout_id: p.id,
        partner_id: p.partner_id.as_str().to_string(),
        rule_id: p.rule_id,
        payout_date: p.payout_date.to_string(),
        amount: p.amount.to_canonical_string(),
        transaction_id: p.transaction_id.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<PayoutDto>,
    pub paid: bool,
}

pub async fn evaluate_incentives(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let date = match req.date {
        Some(raw) => parse_date(&raw, "date")?,
        None => TimeMs::now().utc_date(),
    };

    let payout = state.incentives.evaluate_and_pay(&partner, date).await?;
    let paid = payout.is_some();

    // Not paid by this call: surface the existing payout for the day, if any.
    let payout = match payout {
        Some(p) => Some(p),
        None => state.repo.get_payout(&partner, date).await?,
    };

    Ok(Json(EvaluateResponse {
        paid,
        payout: payout.as_ref().map(payout_dto),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    /// Defaults to today (UTC).
    pub date: Option<String>,
}

pub async fn sweep_incentives(
    State(state): State<AppState>,
    Json(req): Json<SweepRequest>,
) -> Result<Json<SweepReport>, AppError> {
    let date = match req.date {
        Some(raw) => parse_date(&raw, "date")?,
        None => TimeMs::now().utc_date(),
    };

    let report = state.incentives.process_daily_incentives(date).await?;
    Ok(Json(report))
}
