//! Service layer: business rules composed over the repository.
//!
//! Each service owns one concern and shares the repository through an Arc:
//! - `ShiftTracker` - shift lifecycle and login-duration stats
//! - `EarningAttributor` - delivered orders into wallet credits
//! - `IncentiveEvaluator` - daily incentive rules and payouts
//! - `ReferralSettlement` - referral links and reward settlement
//! - `Ledger` - wallet mutations, withdrawals, reconciliation

pub mod earning_attributor;
pub mod incentive_evaluator;
pub mod ledger;
pub mod referral_settlement;
pub mod shift_tracker;

pub use earning_attributor::{EarningAttributor, EarningInput};
pub use incentive_evaluator::{IncentiveEvaluator, SweepReport};
pub use ledger::Ledger;
pub use referral_settlement::ReferralSettlement;
pub use shift_tracker::ShiftTracker;
