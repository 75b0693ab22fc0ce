pub mod earnings;
pub mod health;
pub mod incentives;
pub mod orders;
pub mod partners;
pub mod referrals;
pub mod shifts;
pub mod wallet;

use crate::db::Repository;
use crate::engine::{
    EarningAttributor, IncentiveEvaluator, Ledger, ReferralSettlement, ShiftTracker,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub shifts: Arc<ShiftTracker>,
    pub earnings: Arc<EarningAttributor>,
    pub incentives: Arc<IncentiveEvaluator>,
    pub referrals: Arc<ReferralSettlement>,
    pub ledger: Arc<Ledger>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/partners", post(partners::register_partner))
        .route("/v1/orders", post(orders::create_order))
        .route("/v1/orders/:id/status", post(orders::update_order_status))
        .route("/v1/shifts/start", post(shifts::start_shift))
        .route("/v1/shifts/end", post(shifts::end_shift))
        .route("/v1/shifts/stats", get(shifts::get_shift_stats))
        .route(
            "/v1/earnings",
            post(earnings::record_earning).get(earnings::get_earnings),
        )
        .route("/v1/earnings/bulk", post(earnings::bulk_record_earnings))
        .route("/v1/incentives/rules", post(incentives::create_rule))
        .route(
            "/v1/incentives/rules/:id/deactivate",
            post(incentives::deactivate_rule),
        )
        .route(
            "/v1/incentives/available",
            get(incentives::get_available_incentives),
        )
        .route("/v1/incentives/evaluate", post(incentives::evaluate_incentives))
        .route("/v1/incentives/sweep", post(incentives::sweep_incentives))
        .route("/v1/referrals", post(referrals::create_referral))
        .route(
            "/v1/referrals/delivery-completed",
            post(referrals::delivery_completed),
        )
        .route("/v1/referrals/stats", get(referrals::get_referral_stats))
        .route("/v1/wallet", get(wallet::get_wallet))
        .route("/v1/wallet/transactions", get(wallet::get_transactions))
        .route("/v1/wallet/deposit", post(wallet::deposit))
        .route("/v1/wallet/refresh", post(wallet::refresh_wallet))
        .route("/v1/wallet/withdrawals", post(wallet::request_withdrawal))
        .route(
            "/v1/wallet/withdrawals/:id/status",
            post(wallet::update_withdrawal_status),
        )
        .layer(cors)
        .with_state(state)
}
