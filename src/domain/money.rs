//! Lossless monetary amount backed by rust_decimal.
//!
//! Provides canonical parsing from strings and formatting without exponent
//! notation. Amounts are stored in the database as canonical strings and
//! summed in Rust, never with SQL aggregate functions.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless monetary amount for ledger calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON number (not string) by default.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Money {
    /// Create a Money from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Money(value)
    }

    /// Parse a Money from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Money)
    }

    /// Format the amount as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Money(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Round to two decimal places, midpoint away from zero.
    ///
    /// Computed fees are rounded before they touch the ledger so stored
    /// amounts are always representable paisa values.
    pub fn round2(&self) -> Self {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Money {
    fn from(value: RustDecimal) -> Self {
        Money(value)
    }
}

impl From<Money> for RustDecimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

// Arithmetic operations
impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Money {
    type Output = Money;

    fn mul(self, rhs: Money) -> Money {
        Money(self.0 * rhs.0)
    }
}

impl std::ops::Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_parse_roundtrip() {
        let test_cases = vec!["123.456", "0.01", "1000000", "-123.456", "0", "25"];

        for s in test_cases {
            let amount = Money::from_str_canonical(s).expect("parse failed");
            let formatted = amount.to_canonical_string();
            let reparsed = Money::from_str_canonical(&formatted).expect("reparse failed");
            assert_eq!(amount, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_money_canonical_no_exponent() {
        let amount = Money::from_str_canonical("123").expect("parse failed");
        let formatted = amount.to_canonical_string();
        assert!(
            !formatted.contains('e'),
            "formatted string should not contain exponent"
        );
        assert_eq!(formatted, "123");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_str_canonical("10.5").unwrap();
        let b = Money::from_str_canonical("2.5").unwrap();

        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((-a).to_canonical_string(), "-10.5");
    }

    #[test]
    fn test_money_round2() {
        let a = Money::from_str_canonical("5.005").unwrap();
        assert_eq!(a.round2().to_canonical_string(), "5.01");

        let b = Money::from_str_canonical("25").unwrap();
        assert_eq!(b.round2().to_canonical_string(), "25");

        let c = Money::from_str_canonical("-1.125").unwrap();
        assert_eq!(c.round2().to_canonical_string(), "-1.13");
    }

    #[test]
    fn test_money_sign_checks() {
        assert!(Money::from_str_canonical("0.01").unwrap().is_positive());
        assert!(Money::from_str_canonical("-5").unwrap().is_negative());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
        assert!(!Money::zero().is_negative());
    }

    #[test]
    fn test_money_json_serialization() {
        let amount = Money::from_str_canonical("123.45").unwrap();
        let json = serde_json::to_value(amount).unwrap();
        // Should serialize as a JSON number, not a string
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.45");
    }

    #[test]
    fn test_money_ordering() {
        let a = Money::from_str_canonical("10").unwrap();
        let b = Money::from_str_canonical("20").unwrap();
        assert!(a < b);
        assert_eq!(a.max(b), b);
    }
}
