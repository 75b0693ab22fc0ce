//! Wallet, transaction ledger, and withdrawal types.

use crate::domain::{Money, OrderId, PartnerId, TimeMs};
use serde::{Deserialize, Serialize};

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Credit,
    Debit,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Credit => "credit",
            TxType::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TxType::Credit),
            "debit" => Some(TxType::Debit),
            _ => None,
        }
    }
}

/// Settlement state of a ledger entry. Credits complete synchronously;
/// withdrawal debits stay Pending until the external settlement callback
/// resolves them. A Completed transaction is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
            TxStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TxStatus::Pending),
            "completed" => Some(TxStatus::Completed),
            "failed" => Some(TxStatus::Failed),
            "cancelled" => Some(TxStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether this entry currently holds or has consumed wallet funds.
    /// Failed/Cancelled debits have had their hold released.
    pub fn affects_balance(&self) -> bool {
        matches!(self, TxStatus::Pending | TxStatus::Completed)
    }
}

/// The atomic unit of the ledger. Amounts are signed: credits positive,
/// debits negative. Rows are append-only; a Completed row is never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub partner_id: PartnerId,
    pub title: String,
    pub description: String,
    pub amount: Money,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub reference_no: String,
    pub order_id: Option<OrderId>,
    pub referral_id: Option<i64>,
    pub created_at_ms: TimeMs,
    pub completed_at_ms: Option<TimeMs>,
}

impl WalletTransaction {
    /// Build a Completed credit entry. `amount` must be positive; callers
    /// validate before constructing.
    pub fn completed_credit(
        partner_id: PartnerId,
        amount: Money,
        title: impl Into<String>,
        description: impl Into<String>,
        order_id: Option<OrderId>,
        referral_id: Option<i64>,
        now: TimeMs,
    ) -> Self {
        WalletTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            reference_no: reference_no("CR", now, &partner_id),
            partner_id,
            title: title.into(),
            description: description.into(),
            amount,
            tx_type: TxType::Credit,
            status: TxStatus::Completed,
            order_id,
            referral_id,
            created_at_ms: now,
            completed_at_ms: Some(now),
        }
    }

    /// Build a debit entry holding `amount` (stored negated).
    pub fn debit(
        partner_id: PartnerId,
        amount: Money,
        title: impl Into<String>,
        description: impl Into<String>,
        status: TxStatus,
        prefix: &str,
        now: TimeMs,
    ) -> Self {
        WalletTransaction {
            id: uuid::Uuid::new_v4().to_string(),
            reference_no: reference_no(prefix, now, &partner_id),
            partner_id,
            title: title.into(),
            description: description.into(),
            amount: -amount,
            tx_type: TxType::Debit,
            status,
            order_id: None,
            referral_id: None,
            created_at_ms: now,
            completed_at_ms: (status == TxStatus::Completed).then_some(now),
        }
    }
}

/// Generate an opaque unique reference number: operation prefix, timestamp,
/// partner id, and an entropy suffix. Uniqueness is enforced by the store;
/// the format is not a wire contract.
pub fn reference_no(prefix: &str, at: TimeMs, partner: &PartnerId) -> String {
    let entropy = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}-{}", prefix, at.as_ms(), partner.as_str(), &entropy[..8])
}

/// Materialized balance per partner: a cache of the transaction-log sums,
/// recomputable from scratch via the ledger's refresh operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub partner_id: PartnerId,
    pub balance: Money,
    pub weekly_earnings: Money,
    pub monthly_earnings: Money,
    pub lifetime_earnings: Money,
    pub updated_at_ms: TimeMs,
}

impl Wallet {
    /// Fresh zero-balance wallet, created lazily on first credit.
    pub fn empty(partner_id: PartnerId, now: TimeMs) -> Self {
        Wallet {
            partner_id,
            balance: Money::zero(),
            weekly_earnings: Money::zero(),
            monthly_earnings: Money::zero(),
            lifetime_earnings: Money::zero(),
            updated_at_ms: now,
        }
    }
}

/// Destination rail for a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalMethod {
    BankTransfer,
    Upi,
}

impl WithdrawalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalMethod::BankTransfer => "bank_transfer",
            WithdrawalMethod::Upi => "upi",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bank_transfer" => Some(WithdrawalMethod::BankTransfer),
            "upi" => Some(WithdrawalMethod::Upi),
            _ => None,
        }
    }
}

/// State machine for a withdrawal request. Settlement is external; this
/// core only records the transitions and their ledger effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Requested,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Requested => "requested",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(WithdrawalStatus::Requested),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            "cancelled" => Some(WithdrawalStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Failed | WithdrawalStatus::Cancelled
        )
    }

    /// Requested may move to Processing or straight to a terminal state;
    /// Processing may only move to a terminal state.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        match self {
            WithdrawalStatus::Requested => next != WithdrawalStatus::Requested,
            WithdrawalStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

/// A pending external payout. The ledger debit of `amount + fee` is created
/// with the request; real money movement is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub partner_id: PartnerId,
    pub amount: Money,
    pub fee: Money,
    pub method: WithdrawalMethod,
    pub destination: String,
    pub status: WithdrawalStatus,
    pub reference_no: String,
    pub transaction_id: String,
    pub created_at_ms: TimeMs,
    pub updated_at_ms: TimeMs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_debit_stores_negated_amount() {
        let t = WalletTransaction::debit(
            PartnerId::new("p1"),
            Money::from_str("100").unwrap(),
            "Withdrawal",
            "",
            TxStatus::Pending,
            "WD",
            TimeMs::new(1000),
        );
        assert_eq!(t.amount, Money::from_str("-100").unwrap());
        assert_eq!(t.tx_type, TxType::Debit);
        assert!(t.completed_at_ms.is_none());
    }

    #[test]
    fn test_completed_credit_has_completion_time() {
        let t = WalletTransaction::completed_credit(
            PartnerId::new("p1"),
            Money::from_str("25").unwrap(),
            "Delivery earning",
            "",
            Some(OrderId::new("o1")),
            None,
            TimeMs::new(1000),
        );
        assert_eq!(t.status, TxStatus::Completed);
        assert_eq!(t.completed_at_ms, Some(TimeMs::new(1000)));
        assert!(t.reference_no.starts_with("CR-1000-p1-"));
    }

    #[test]
    fn test_reference_numbers_unique() {
        let p = PartnerId::new("p1");
        let a = reference_no("CR", TimeMs::new(1000), &p);
        let b = reference_no("CR", TimeMs::new(1000), &p);
        assert_ne!(a, b);
    }

    #[test]
    fn test_tx_status_balance_effect() {
        assert!(TxStatus::Pending.affects_balance());
        assert!(TxStatus::Completed.affects_balance());
        assert!(!TxStatus::Failed.affects_balance());
        assert!(!TxStatus::Cancelled.affects_balance());
    }

    #[test]
    fn test_withdrawal_transitions_forward_only() {
        use WithdrawalStatus::*;
        assert!(Requested.can_transition_to(Processing));
        assert!(Requested.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Requested));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Cancelled.can_transition_to(Processing));
    }
}
