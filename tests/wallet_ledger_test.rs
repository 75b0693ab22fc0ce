use fleetledger::config::WithdrawalFees;
use fleetledger::db::init_db;
use fleetledger::domain::{Money, PartnerId, WithdrawalMethod, WithdrawalStatus};
use fleetledger::engine::Ledger;
use fleetledger::error::AppError;
use fleetledger::Repository;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup() -> (Ledger, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let fees = WithdrawalFees {
        upi: Money::from_str("5").unwrap(),
        bank_transfer: Money::zero(),
    };
    (Ledger::new(repo, fees), temp_dir)
}

fn money(s: &str) -> Money {
    Money::from_str(s).unwrap()
}

/// The incrementally maintained wallet row must always match the wallet
/// recomputed from the transaction log.
async fn assert_reconciled(ledger: &Ledger, partner: &PartnerId) {
    let cached = ledger.wallet(partner).await.unwrap();
    let recomputed = ledger.refresh(partner).await.unwrap();
    assert_eq!(cached.balance, recomputed.balance, "balance diverged");
    assert_eq!(
        cached.lifetime_earnings, recomputed.lifetime_earnings,
        "lifetime earnings diverged"
    );
    assert_eq!(
        cached.weekly_earnings, recomputed.weekly_earnings,
        "weekly earnings diverged"
    );
    assert_eq!(
        cached.monthly_earnings, recomputed.monthly_earnings,
        "monthly earnings diverged"
    );
}

#[tokio::test]
async fn test_credit_then_debit_sequence_reconciles() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");

    ledger
        .credit(&partner, money("100"), "Deposit", "seed", None, None)
        .await
        .unwrap();
    ledger
        .credit(&partner, money("25.50"), "Deposit", "seed", None, None)
        .await
        .unwrap();
    ledger
        .debit(&partner, money("30"), "Adjustment", "manual")
        .await
        .unwrap();

    let wallet = ledger.wallet(&partner).await.unwrap();
    assert_eq!(wallet.balance, money("95.50"));
    assert_eq!(wallet.lifetime_earnings, money("125.50"));
    assert_reconciled(&ledger, &partner).await;
}

#[tokio::test]
async fn test_non_positive_credit_rejected() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");

    let err = ledger
        .credit(&partner, money("0"), "Deposit", "", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = ledger
        .credit(&partner, money("-10"), "Deposit", "", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_debit_beyond_balance_rejected_and_state_unchanged() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");
    ledger
        .credit(&partner, money("50"), "Deposit", "", None, None)
        .await
        .unwrap();

    let err = ledger
        .debit(&partner, money("60"), "Adjustment", "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance(_)));

    let wallet = ledger.wallet(&partner).await.unwrap();
    assert_eq!(wallet.balance, money("50"));
    let txs = ledger.transactions(&partner, None, None, 100).await.unwrap();
    assert_eq!(txs.len(), 1, "rejected debit must not leave a row");
    assert_reconciled(&ledger, &partner).await;
}

#[tokio::test]
async fn test_withdrawal_holds_amount_plus_fee() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");
    ledger
        .credit(&partner, money("100"), "Deposit", "", None, None)
        .await
        .unwrap();

    let (withdrawal, wallet) = ledger
        .request_withdrawal(&partner, money("50"), WithdrawalMethod::Upi, "user@upi")
        .await
        .unwrap();

    assert_eq!(withdrawal.amount, money("50"));
    assert_eq!(withdrawal.fee, money("5"));
    assert_eq!(withdrawal.status, WithdrawalStatus::Requested);
    assert_eq!(wallet.balance, money("45"));
    // The hold counts against further withdrawals immediately.
    let err = ledger
        .request_withdrawal(&partner, money("45"), WithdrawalMethod::Upi, "user@upi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance(_)));
    assert_reconciled(&ledger, &partner).await;
}

#[tokio::test]
async fn test_failed_withdrawal_releases_hold() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");
    ledger
        .credit(&partner, money("100"), "Deposit", "", None, None)
        .await
        .unwrap();

    let (withdrawal, _) = ledger
        .request_withdrawal(&partner, money("50"), WithdrawalMethod::Upi, "user@upi")
        .await
        .unwrap();

    let updated = ledger
        .update_withdrawal_status(&withdrawal.id, WithdrawalStatus::Failed)
        .await
        .unwrap();
    assert_eq!(updated.status, WithdrawalStatus::Failed);

    let wallet = ledger.wallet(&partner).await.unwrap();
    assert_eq!(wallet.balance, money("100"), "amount and fee both released");
    assert_reconciled(&ledger, &partner).await;
}

#[tokio::test]
async fn test_completed_withdrawal_consumes_funds() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");
    ledger
        .credit(&partner, money("100"), "Deposit", "", None, None)
        .await
        .unwrap();

    let (withdrawal, _) = ledger
        .request_withdrawal(&partner, money("40"), WithdrawalMethod::BankTransfer, "acct-1")
        .await
        .unwrap();
    assert_eq!(withdrawal.fee, money("0"));

    ledger
        .update_withdrawal_status(&withdrawal.id, WithdrawalStatus::Processing)
        .await
        .unwrap();
    let done = ledger
        .update_withdrawal_status(&withdrawal.id, WithdrawalStatus::Completed)
        .await
        .unwrap();
    assert_eq!(done.status, WithdrawalStatus::Completed);

    let wallet = ledger.wallet(&partner).await.unwrap();
    assert_eq!(wallet.balance, money("60"));
    assert_reconciled(&ledger, &partner).await;
}

#[tokio::test]
async fn test_terminal_withdrawal_rejects_further_transitions() {
    let (ledger, _temp) = setup().await;
    let partner = PartnerId::new("p1");
    ledger
        .credit(&partner, money("100"), "Deposit", "", None, None)
        .await
        .unwrap();

    let (withdrawal, _) = ledger
        .request_withdrawal(&partner, money("50"), WithdrawalMethod::Upi, "user@upi")
        .await
        .unwrap();
    ledger
        .update_withdrawal_status(&withdrawal.id, WithdrawalStatus::Cancelled)
        .await
        .unwrap();

    let err = ledger
        .update_withdrawal_status(&withdrawal.id, WithdrawalStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The cancelled hold was released exactly once.
    let wallet = ledger.wallet(&partner).await.unwrap();
    assert_eq!(wallet.balance, money("100"));
    assert_reconciled(&ledger, &partner).await;
}

#[tokio::test]
async fn test_unknown_withdrawal_is_not_found() {
    let (ledger, _temp) = setup().await;
    let err = ledger
        .update_withdrawal_status("nope", WithdrawalStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_wallet_for_unknown_partner_is_not_found() {
    let (ledger, _temp) = setup().await;
    let err = ledger.wallet(&PartnerId::new("ghost")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
