use crate::domain::Money;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub earning_policy: EarningPolicy,
    pub withdrawal_fees: WithdrawalFees,
    pub referral_policy: ReferralPolicy,
}

/// Per-delivery fee computation: max(base_fee, min(order_value * rate, cap)).
/// Business constants live here, not in the attributor, so tests can
/// exercise varied policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningPolicy {
    pub base_fee: Money,
    pub commission_rate: Money,
    pub fee_cap: Money,
}

impl EarningPolicy {
    /// Fee for a delivered order of the given value, rounded to 2 decimals.
    pub fn fee_for(&self, order_value: Money) -> Money {
        let commission = (order_value * self.commission_rate).min(self.fee_cap);
        self.base_fee.max(commission).round2()
    }
}

/// Flat processing fee per withdrawal method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalFees {
    pub upi: Money,
    pub bank_transfer: Money,
}

impl WithdrawalFees {
    pub fn fee_for(&self, method: crate::domain::WithdrawalMethod) -> Money {
        match method {
            crate::domain::WithdrawalMethod::Upi => self.upi,
            crate::domain::WithdrawalMethod::BankTransfer => self.bank_transfer,
        }
    }
}

/// Defaults applied when a referral link is created without overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralPolicy {
    pub required_deliveries: i64,
    pub referrer_reward: Money,
    pub referee_reward: Money,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let earning_policy = EarningPolicy {
            base_fee: parse_money(&env_map, "BASE_DELIVERY_FEE", "25")?,
            commission_rate: parse_money(&env_map, "COMMISSION_RATE", "0.05")?,
            fee_cap: parse_money(&env_map, "DELIVERY_FEE_CAP", "100")?,
        };

        let withdrawal_fees = WithdrawalFees {
            upi: parse_money(&env_map, "UPI_WITHDRAWAL_FEE", "5")?,
            bank_transfer: parse_money(&env_map, "BANK_WITHDRAWAL_FEE", "0")?,
        };

        let referral_policy = ReferralPolicy {
            required_deliveries: env_map
                .get("REFERRAL_REQUIRED_DELIVERIES")
                .map(|s| s.as_str())
                .unwrap_or("10")
                .parse::<i64>()
                .map_err(|_| {
                    ConfigError::InvalidValue(
                        "REFERRAL_REQUIRED_DELIVERIES".to_string(),
                        "must be a valid i64".to_string(),
                    )
                })?,
            referrer_reward: parse_money(&env_map, "REFERRAL_REFERRER_REWARD", "200")?,
            referee_reward: parse_money(&env_map, "REFERRAL_REFEREE_REWARD", "100")?,
        };

        Ok(Config {
            port,
            database_path,
            earning_policy,
            withdrawal_fees,
            referral_policy,
        })
    }
}

fn parse_money(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Money, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Money::from_str(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a valid decimal".to_string())
    })
}
