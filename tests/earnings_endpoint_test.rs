use axum::http::StatusCode;
use fleetledger::api;
use fleetledger::config::Config;
use fleetledger::db::init_db;
use fleetledger::engine::{
    EarningAttributor, IncentiveEvaluator, Ledger, ReferralSettlement, ShiftTracker,
};
use fleetledger::Repository;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), db_path);
    let config = Config::from_env_map(env).expect("config failed");

    let incentives = Arc::new(IncentiveEvaluator::new(repo.clone()));
    let shifts = Arc::new(ShiftTracker::new(repo.clone(), incentives.clone()));
    let earnings = Arc::new(EarningAttributor::new(repo.clone(), config.earning_policy));
    let referrals = Arc::new(ReferralSettlement::new(repo.clone(), config.referral_policy));
    let ledger = Arc::new(Ledger::new(repo.clone(), config.withdrawal_fees));

    let app = api::create_router(api::AppState {
        repo,
        shifts,
        earnings,
        incentives,
        referrals,
        ledger,
    });

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn post(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Register a partner and create an order already moved to delivered.
async fn seed_delivered_order(app: &axum::Router, partner: &str, order: &str, value: &str) {
    let (status, _) = post(
        app.clone(),
        "/v1/partners",
        serde_json::json!({"partnerId": partner}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        app.clone(),
        "/v1/orders",
        serde_json::json!({"orderId": order, "partnerId": partner, "orderValue": value}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        app.clone(),
        &format!("/v1/orders/{}/status", order),
        serde_json::json!({"status": "delivered"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_record_earning_applies_fee_policy() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "100").await;

    // max(25, min(100 * 0.05, 100)) = 25 under default policy.
    let (status, body) = post(
        test_app.app.clone(),
        "/v1/earnings",
        serde_json::json!({"partnerId": "p1", "orderId": "o1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["earning"]["amount"], "25");

    let (_status, wallet) = get(test_app.app, "/v1/wallet?partnerId=p1").await;
    assert_eq!(wallet["balance"], "25");
    assert_eq!(wallet["lifetimeEarnings"], "25");
}

#[tokio::test]
async fn test_commission_beats_base_fee_for_large_orders() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "1000").await;

    let (_status, body) = post(
        test_app.app,
        "/v1/earnings",
        serde_json::json!({"partnerId": "p1", "orderId": "o1"}),
    )
    .await;
    assert_eq!(body["earning"]["amount"], "50");
}

#[tokio::test]
async fn test_duplicate_delivery_signal_is_conflict_and_credits_once() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "100").await;

    let body = serde_json::json!({"partnerId": "p1", "orderId": "o1"});
    let (status, _) = post(test_app.app.clone(), "/v1/earnings", body.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(test_app.app.clone(), "/v1/earnings", body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_status, wallet) = get(test_app.app, "/v1/wallet?partnerId=p1").await;
    assert_eq!(wallet["balance"], "25");
}

#[tokio::test]
async fn test_earning_rejected_for_undelivered_order() {
    let test_app = setup_test_app().await;
    post(
        test_app.app.clone(),
        "/v1/partners",
        serde_json::json!({"partnerId": "p1"}),
    )
    .await;
    post(
        test_app.app.clone(),
        "/v1/orders",
        serde_json::json!({"orderId": "o1", "partnerId": "p1", "orderValue": "100"}),
    )
    .await;

    let (status, _) = post(
        test_app.app,
        "/v1/earnings",
        serde_json::json!({"partnerId": "p1", "orderId": "o1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_earning_rejected_for_wrong_partner() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "100").await;

    let (status, _) = post(
        test_app.app,
        "/v1/earnings",
        serde_json::json!({"partnerId": "p2", "orderId": "o1"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_earning_for_unknown_order_is_not_found() {
    let test_app = setup_test_app().await;
    let (status, _) = post(
        test_app.app,
        "/v1/earnings",
        serde_json::json!({"partnerId": "p1", "orderId": "missing"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_earnings_reports_per_item_outcomes() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "100").await;
    seed_delivered_order(&test_app.app, "p1", "o2", "100").await;

    // o1 recorded up-front so the batch sees it as a duplicate.
    post(
        test_app.app.clone(),
        "/v1/earnings",
        serde_json::json!({"partnerId": "p1", "orderId": "o1"}),
    )
    .await;

    let (status, body) = post(
        test_app.app.clone(),
        "/v1/earnings/bulk",
        serde_json::json!({"items": [
            {"partnerId": "p1", "orderId": "o1"},
            {"partnerId": "p1", "orderId": "o2"},
            {"partnerId": "p1", "orderId": "missing"},
        ]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recorded"], 1);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["items"][0]["outcome"], "skipped");
    assert_eq!(body["items"][1]["outcome"], "recorded");
    assert_eq!(body["items"][2]["outcome"], "failed");

    // Only the two real earnings credited.
    let (_status, wallet) = get(test_app.app, "/v1/wallet?partnerId=p1").await;
    assert_eq!(wallet["balance"], "50");
}

#[tokio::test]
async fn test_get_earnings_lists_and_totals() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "100").await;
    seed_delivered_order(&test_app.app, "p1", "o2", "1000").await;

    for order in ["o1", "o2"] {
        post(
            test_app.app.clone(),
            "/v1/earnings",
            serde_json::json!({"partnerId": "p1", "orderId": order}),
        )
        .await;
    }

    let (status, body) = get(test_app.app, "/v1/earnings?partnerId=p1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["earningCount"], 2);
    assert_eq!(body["totalAmount"], "75");
    assert_eq!(body["earnings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_earnings_rejects_inverted_window() {
    let test_app = setup_test_app().await;
    let (status, _) = get(
        test_app.app,
        "/v1/earnings?partnerId=p1&fromMs=2000&toMs=1000",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_explicit_amount_overrides_policy() {
    let test_app = setup_test_app().await;
    seed_delivered_order(&test_app.app, "p1", "o1", "100").await;

    let (status, body) = post(
        test_app.app,
        "/v1/earnings",
        serde_json::json!({"partnerId": "p1", "orderId": "o1", "amount": "33.33"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["earning"]["amount"], "33.33");
}
