use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{PartnerId, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPartnerRequest {
    pub partner_id: String,
    pub city: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPartnerResponse {
    pub partner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub created: bool,
}

pub async fn register_partner(
    State(state): State<AppState>,
    Json(req): Json<RegisterPartnerRequest>,
) -> Result<Json<RegisterPartnerResponse>, AppError> {
    if req.partner_id.trim().is_empty() {
        return Err(AppError::Validation("partnerId is required".into()));
    }

    let id = PartnerId::new(req.partner_id);
    let created = state
        .repo
        .upsert_partner(&id, req.city.as_deref(), TimeMs::now())
        .await?;

    Ok(Json(RegisterPartnerResponse {
        partner_id: id.as_str().to_string(),
        city: req.city,
        created,
    }))
}
