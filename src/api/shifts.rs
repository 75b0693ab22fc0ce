use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{GeoPoint, PartnerId, Shift, ShiftStats};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftActionRequest {
    pub partner_id: String,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftResponse {
    pub shift_id: i64,
    pub partner_id: String,
    pub start_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    pub open: bool,
}

fn shift_response(shift: &Shift) -> ShiftResponse {
    ShiftResponse {
        shift_id: shift.id,
        partner_id: shift.partner_id.as_str().to_string(),
        start_ms: shift.start_ms.as_ms(),
        end_ms: shift.end_ms.map(|t| t.as_ms()),
        open: shift.is_open(),
    }
}

pub async fn start_shift(
    State(state): State<AppState>,
    Json(req): Json<ShiftActionRequest>,
) -> Result<Json<ShiftResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let shift = state.shifts.start_shift(&partner, req.location).await?;
    Ok(Json(shift_response(&shift)))
}

/// Closing a shift answers with the closed shift plus the partner's
/// login-duration aggregates, so clients get the day's summary in one call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndShiftResponse {
    #[serde(flatten)]
    pub shift: ShiftResponse,
    pub stats: ShiftStatsResponse,
}

pub async fn end_shift(
    State(state): State<AppState>,
    Json(req): Json<ShiftActionRequest>,
) -> Result<Json<EndShiftResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let shift = state.shifts.end_shift(&partner, req.location).await?;
    let stats = state.shifts.stats(&partner).await?;
    Ok(Json(EndShiftResponse {
        shift: shift_response(&shift),
        stats: stats_response(&partner, stats),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftStatsQuery {
    pub partner_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftStatsResponse {
    pub partner_id: String,
    pub today_ms: i64,
    pub week_ms: i64,
    pub month_ms: i64,
    pub shift_count: i64,
}

fn stats_response(partner: &PartnerId, stats: ShiftStats) -> ShiftStatsResponse {
    ShiftStatsResponse {
        partner_id: partner.as_str().to_string(),
        today_ms: stats.today_ms,
        week_ms: stats.week_ms,
        month_ms: stats.month_ms,
        shift_count: stats.shift_count,
    }
}

pub async fn get_shift_stats(
    Query(params): Query<ShiftStatsQuery>,
    State(state): State<AppState>,
) -> Result<Json<ShiftStatsResponse>, AppError> {
    let partner = PartnerId::new(params.partner_id);
    let stats = state.shifts.stats(&partner).await?;
    Ok(Json(stats_response(&partner, stats)))
}
