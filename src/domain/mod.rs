//! Domain types for the delivery-partner wallet ledger.
//!
//! This module provides:
//! - Lossless monetary handling via the Money wrapper
//! - Domain primitives: TimeMs, PartnerId, OrderId, GeoPoint
//! - Entities: Shift, DeliveryOrder, Earning, IncentiveRule, ReferralLink,
//!   WalletTransaction, Wallet, WithdrawalRequest
//! - Status enums with forward-only transition checks

pub mod earning;
pub mod incentive;
pub mod money;
pub mod order;
pub mod partner;
pub mod primitives;
pub mod referral;
pub mod shift;
pub mod wallet;

pub use earning::{BulkEarningItemResult, BulkEarningOutcome, BulkEarningReport, Earning};
pub use incentive::{best_rule, IncentivePayout, IncentiveRule, RuleProgress};
pub use money::Money;
pub use order::{DeliveryOrder, OrderStatus};
pub use partner::Partner;
pub use primitives::{day_window, GeoPoint, OrderId, PartnerId, TimeMs};
pub use referral::{ReferralLink, ReferralProgress, ReferralStats, ReferralStatus};
pub use shift::{Shift, ShiftStats};
pub use wallet::{
    reference_no, TxStatus, TxType, Wallet, WalletTransaction, WithdrawalMethod, WithdrawalRequest,
    WithdrawalStatus,
};
