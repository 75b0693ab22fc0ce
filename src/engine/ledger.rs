//! Ledger: the single code path for all wallet mutations and aggregates.
//!
//! Both the incremental counters and the from-scratch `refresh` live behind
//! this service so tests can assert the two always agree.

use crate::config::WithdrawalFees;
use crate::db::Repository;
use crate::domain::{
    Money, OrderId, PartnerId, TimeMs, TxStatus, Wallet, WalletTransaction, WithdrawalMethod,
    WithdrawalRequest, WithdrawalStatus,
};
use crate::error::AppError;
use std::sync::Arc;

#[derive(Clone)]
pub struct Ledger {
    repo: Arc<Repository>,
    fees: WithdrawalFees,
}

impl Ledger {
    pub fn new(repo: Arc<Repository>, fees: WithdrawalFees) -> Self {
        Self { repo, fees }
    }

    /// Credit the wallet with a Completed transaction. The transaction
    /// insert and the cached-balance update commit together.
    pub async fn credit(
        &self,
        partner: &PartnerId,
        amount: Money,
        title: &str,
        description: &str,
        order_id: Option<OrderId>,
        referral_id: Option<i64>,
    ) -> Result<(WalletTransaction, Wallet), AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(
                "credit amount must be positive".to_string(),
            ));
        }

        let credit = WalletTransaction::completed_credit(
            partner.clone(),
            amount,
            title,
            description,
            order_id,
            referral_id,
            TimeMs::now(),
        );
        let wallet = self.repo.insert_credit(&credit).await?;
        Ok((credit, wallet))
    }

    /// Debit the wallet with a Completed transaction; rejects amounts above
    /// the current balance.
    pub async fn debit(
        &self,
        partner: &PartnerId,
        amount: Money,
        title: &str,
        description: &str,
    ) -> Result<(WalletTransaction, Wallet), AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(
                "debit amount must be positive".to_string(),
            ));
        }

        let debit = WalletTransaction::debit(
            partner.clone(),
            amount,
            title,
            description,
            TxStatus::Completed,
            "DB",
            TimeMs::now(),
        );
        let wallet = self.repo.insert_debit(&debit).await?;
        Ok((debit, wallet))
    }

    /// Record a withdrawal request: a Pending debit of `amount + fee` holds
    /// the funds; settlement is an external process reported back via
    /// `update_withdrawal_status`.
    pub async fn request_withdrawal(
        &self,
        partner: &PartnerId,
        amount: Money,
        method: WithdrawalMethod,
        destination: &str,
    ) -> Result<(WithdrawalRequest, Wallet), AppError> {
        if !amount.is_positive() {
            return Err(AppError::Validation(
                "withdrawal amount must be positive".to_string(),
            ));
        }
        if destination.trim().is_empty() {
            return Err(AppError::Validation(
                "withdrawal destination is required".to_string(),
            ));
        }

        let now = TimeMs::now();
        let fee = self.fees.fee_for(method);
        let debit = WalletTransaction::debit(
            partner.clone(),
            amount + fee,
            "Withdrawal",
            format!("{} withdrawal to {}", method.as_str(), destination),
            TxStatus::Pending,
            "WD",
            now,
        );

        let request = WithdrawalRequest {
            id: uuid::Uuid::new_v4().to_string(),
            partner_id: partner.clone(),
            amount,
            fee,
            method,
            destination: destination.to_string(),
            status: WithdrawalStatus::Requested,
            reference_no: debit.reference_no.clone(),
            transaction_id: debit.id.clone(),
            created_at_ms: now,
            updated_at_ms: now,
        };

        let wallet = self.repo.insert_withdrawal(&request, &debit).await?;
        Ok((request, wallet))
    }

    /// Apply an external settlement outcome to a withdrawal.
    pub async fn update_withdrawal_status(
        &self,
        id: &str,
        next: WithdrawalStatus,
    ) -> Result<WithdrawalRequest, AppError> {
        self.repo.transition_withdrawal(id, next, TimeMs::now()).await
    }

    pub async fn wallet(&self, partner: &PartnerId) -> Result<Wallet, AppError> {
        self.repo
            .get_wallet(partner)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet for partner {} not found", partner)))
    }

    pub async fn transactions(
        &self,
        partner: &PartnerId,
        from_ms: Option<TimeMs>,
        to_ms: Option<TimeMs>,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, AppError> {
        self.repo
            .query_transactions(partner, from_ms, to_ms, limit)
            .await
    }

    /// Recompute the wallet from the transaction log. A divergence from the
    /// incrementally maintained row indicates a bug; tests assert equality
    /// after every operation sequence.
    pub async fn refresh(&self, partner: &PartnerId) -> Result<Wallet, AppError> {
        self.repo.refresh_wallet(partner, TimeMs::now()).await
    }
}
