use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{DeliveryOrder, Money, OrderId, OrderStatus, PartnerId, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_id: String,
    pub partner_id: String,
    /// Decimal string, e.g. "100" or "249.50".
    pub order_value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: String,
    pub partner_id: String,
    pub order_value: String,
    pub status: String,
    pub placed_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

fn order_response(order: &DeliveryOrder, created: Option<bool>) -> OrderResponse {
    OrderResponse {
        order_id: order.id.as_str().to_string(),
        partner_id: order.partner_id.as_str().to_string(),
        order_value: order.order_value.to_canonical_string(),
        status: order.status.as_str().to_string(),
        placed_at_ms: order.placed_at_ms.as_ms(),
        delivered_at_ms: order.delivered_at_ms.map(|t| t.as_ms()),
        created,
    }
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_value = Money::from_str(&req.order_value)
        .map_err(|_| AppError::Validation("orderValue must be a valid decimal".into()))?;
    if !order_value.is_positive() {
        return Err(AppError::Validation("orderValue must be positive".into()));
    }

    let order = DeliveryOrder {
        id: OrderId::new(req.order_id),
        partner_id: PartnerId::new(req.partner_id),
        order_value,
        status: OrderStatus::Placed,
        placed_at_ms: TimeMs::now(),
        delivered_at_ms: None,
    };

    let created = state.repo.insert_order(&order).await?;
    Ok(Json(order_response(&order, Some(created))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let next = OrderStatus::parse(&req.status)
        .ok_or_else(|| AppError::Validation(format!("unknown order status: {}", req.status)))?;

    let order = state
        .repo
        .update_order_status(&OrderId::new(order_id), next, TimeMs::now())
        .await?;

    Ok(Json(order_response(&order, None)))
}
