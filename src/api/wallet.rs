use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::AppState;
use crate::domain::{
    Money, PartnerId, TimeMs, Wallet, WalletTransaction, WithdrawalMethod, WithdrawalRequest,
    WithdrawalStatus,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletQuery {
    pub partner_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub partner_id: String,
    pub balance: String,
    pub weekly_earnings: String,
    pub monthly_earnings: String,
    pub lifetime_earnings: String,
    pub updated_at_ms: i64,
}

fn wallet_response(wallet: &Wallet) -> WalletResponse {
    WalletResponse {
        partner_id: wallet.partner_id.as_str().to_string(),
        balance: wallet.balance.to_canonical_string(),
        weekly_earnings: wallet.weekly_earnings.to_canonical_string(),
        monthly_earnings: wallet.monthly_earnings.to_canonical_string(),
        lifetime_earnings: wallet.lifetime_earnings.to_canonical_string(),
        updated_at_ms: wallet.updated_at_ms.as_ms(),
    }
}

pub async fn get_wallet(
    Query(params): Query<WalletQuery>,
    State(state): State<AppState>,
) -> Result<Json<WalletResponse>, AppError> {
    let partner = PartnerId::new(params.partner_id);
    let wallet = state.ledger.wallet(&partner).await?;
    Ok(Json(wallet_response(&wallet)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    pub partner_id: String,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub transaction_id: String,
    pub title: String,
    pub description: String,
    pub amount: String,
    pub tx_type: String,
    pub status: String,
    pub reference_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_id: Option<i64>,
    pub created_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<i64>,
}

fn transaction_dto(t: &WalletTransaction) -> TransactionDto {
    TransactionDto {
        transaction_id: t.id.clone(),
        title: t.title.clone(),
        description: t.description.clone(),
        amount: t.amount.to_canonical_string(),
        tx_type: t.tx_type.as_str().to_string(),
        status: t.status.as_str().to_string(),
        reference_no: t.reference_no.clone(),
        order_id: t.order_id.as_ref().map(|o| o.as_str().to_string()),
        referral_id: t.referral_id,
        created_at_ms: t.created_at_ms.as_ms(),
        completed_at_ms: t.completed_at_ms.map(|t| t.as_ms()),
    }
}

pub async fn get_transactions(
    Query(params): Query<TransactionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionDto>>, AppError> {
    let partner = PartnerId::new(params.partner_id);
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let transactions = state
        .ledger
        .transactions(
            &partner,
            params.from_ms.map(TimeMs::new),
            params.to_ms.map(TimeMs::new),
            limit,
        )
        .await?;

    Ok(Json(transactions.iter().map(transaction_dto).collect()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub partner_id: String,
    pub amount: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub transaction: TransactionDto,
    pub wallet: WalletResponse,
}

pub async fn deposit(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let amount = Money::from_str(&req.amount)
        .map_err(|_| AppError::Validation("amount must be a valid decimal".into()))?;

    let (transaction, wallet) = state
        .ledger
        .credit(
            &partner,
            amount,
            req.title.as_deref().unwrap_or("Deposit"),
            req.description.as_deref().unwrap_or("Manual deposit"),
            None,
            None,
        )
        .await?;

    Ok(Json(DepositResponse {
        transaction: transaction_dto(&transaction),
        wallet: wallet_response(&wallet),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub partner_id: String,
}

pub async fn refresh_wallet(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<WalletResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let wallet = state.ledger.refresh(&partner).await?;
    Ok(Json(wallet_response(&wallet)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequestBody {
    pub partner_id: String,
    pub amount: String,
    /// "upi" or "bank_transfer".
    pub method: String,
    pub destination: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalResponse {
    pub withdrawal_id: String,
    pub partner_id: String,
    pub amount: String,
    pub fee: String,
    pub method: String,
    pub destination: String,
    pub status: String,
    pub reference_no: String,
    pub created_at_ms: i64,
}

fn withdrawal_response(w: &WithdrawalRequest) -> WithdrawalResponse {
    WithdrawalResponse {
        withdrawal_id: w.id.clone(),
        partner_id: w.partner_id.as_str().to_string(),
        amount: w.amount.to_canonical_string(),
        fee: w.fee.to_canonical_string(),
        method: w.method.as_str().to_string(),
        destination: w.destination.clone(),
        status: w.status.as_str().to_string(),
        reference_no: w.reference_no.clone(),
        created_at_ms: w.created_at_ms.as_ms(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWithdrawalResponse {
    pub withdrawal: WithdrawalResponse,
    pub wallet: WalletResponse,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(req): Json<WithdrawalRequestBody>,
) -> Result<Json<RequestWithdrawalResponse>, AppError> {
    let partner = PartnerId::new(req.partner_id);
    let amount = Money::from_str(&req.amount)
        .map_err(|_| AppError::Validation("amount must be a valid decimal".into()))?;
    let method = WithdrawalMethod::parse(&req.method)
        .ok_or_else(|| AppError::Validation(format!("unknown withdrawal method: {}", req.method)))?;

    let (withdrawal, wallet) = state
        .ledger
        .request_withdrawal(&partner, amount, method, &req.destination)
        .await?;

    Ok(Json(RequestWithdrawalResponse {
        withdrawal: withdrawal_response(&withdrawal),
        wallet: wallet_response(&wallet),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStatusRequest {
    pub status: String,
}

pub async fn update_withdrawal_status(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<String>,
    Json(req): Json<WithdrawalStatusRequest>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let next = WithdrawalStatus::parse(&req.status).ok_or_else(|| {
        AppError::Validation(format!("unknown withdrawal status: {}", req.status))
    })?;

    let withdrawal = state
        .ledger
        .update_withdrawal_status(&withdrawal_id, next)
        .await?;

    Ok(Json(withdrawal_response(&withdrawal)))
}
