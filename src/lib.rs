pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    DeliveryOrder, Earning, GeoPoint, IncentiveRule, Money, OrderId, OrderStatus, PartnerId,
    ReferralLink, Shift, TimeMs, Wallet, WalletTransaction, WithdrawalRequest,
};
pub use error::AppError;
