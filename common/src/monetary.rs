//! Monetary types for PayGate.
//!
//! All value on the host is counted in the smallest native unit. `Amount`
//! never goes negative and every arithmetic helper is checked.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use crate::PaygateError;

/// Largest scale a `Decimal` can carry.
pub const MAX_NATIVE_DECIMALS: u32 = 28;

/// An unsigned amount in the smallest native unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u128);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount.
    pub const MAX: Amount = Amount(u128::MAX);

    /// Create a new amount.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Add, failing on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Subtract, failing if the result would be negative.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Multiply by a count, failing on overflow.
    pub fn checked_mul(self, factor: u128) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Add, mapping overflow to [`PaygateError::Overflow`].
    pub fn try_add(self, other: Amount) -> Result<Amount, PaygateError> {
        self.checked_add(other).ok_or(PaygateError::Overflow)
    }

    /// Render in whole native units, e.g. `0.0001 RBTC`.
    pub fn display_in(self, unit: &NativeUnit) -> NativeDisplay<'_> {
        NativeDisplay { amount: self, unit }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = PaygateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| PaygateError::InvalidAmount(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = PaygateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

impl Sum for Amount {
    /// Saturates at [`Amount::MAX`]; intended for reporting only.
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| Amount(acc.0.saturating_add(a.0)))
    }
}

/// The host's native currency and its subdivision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeUnit {
    /// Ticker symbol.
    pub symbol: String,
    /// Number of decimal places between the whole unit and the smallest unit.
    pub decimals: u32,
}

impl NativeUnit {
    /// Create a new native unit.
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }

    /// Rootstock's RBTC (18 decimals).
    pub fn rbtc() -> Self {
        Self::new("RBTC", 18)
    }

    /// Number of smallest units in one whole unit.
    pub fn one(&self) -> Option<Amount> {
        10u128.checked_pow(self.decimals).map(Amount)
    }

    /// Parse a whole-unit decimal string such as `"0.0001"` into an amount.
    pub fn parse(&self, s: &str) -> Result<Amount, PaygateError> {
        let invalid = || PaygateError::InvalidAmount(s.to_string());

        let value = Decimal::from_str_exact(s.trim()).map_err(|_| invalid())?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(invalid());
        }
        if value.scale() > self.decimals {
            return Err(invalid());
        }

        let mantissa = u128::try_from(value.mantissa()).map_err(|_| invalid())?;
        let factor = 10u128
            .checked_pow(self.decimals - value.scale())
            .ok_or_else(invalid)?;

        mantissa.checked_mul(factor).map(Amount).ok_or_else(invalid)
    }

    /// Convert an amount into a whole-unit decimal, if it fits.
    pub fn to_decimal(&self, amount: Amount) -> Option<Decimal> {
        let raw = i128::try_from(amount.value()).ok()?;
        Decimal::try_from_i128_with_scale(raw, self.decimals)
            .ok()
            .map(|d| d.normalize())
    }
}

impl Default for NativeUnit {
    fn default() -> Self {
        Self::rbtc()
    }
}

impl fmt::Display for NativeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// Display adapter returned by [`Amount::display_in`].
pub struct NativeDisplay<'a> {
    amount: Amount,
    unit: &'a NativeUnit,
}

impl fmt::Display for NativeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit.to_decimal(self.amount) {
            Some(value) => write!(f, "{} {}", value, self.unit.symbol),
            None => write!(f, "{} (smallest {} units)", self.amount, self.unit.symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::new(100);
        let b = Amount::new(40);

        assert_eq!(a.checked_add(b), Some(Amount::new(140)));
        assert_eq!(a.checked_sub(b), Some(Amount::new(60)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(Amount::MAX.checked_add(Amount::new(1)), None);
        assert!(matches!(
            Amount::MAX.try_add(Amount::new(1)),
            Err(PaygateError::Overflow)
        ));
    }

    #[test]
    fn test_parse_native_units() {
        let unit = NativeUnit::rbtc();

        assert_eq!(
            unit.parse("0.0001").unwrap(),
            Amount::new(100_000_000_000_000)
        );
        assert_eq!(unit.parse("1").unwrap(), Amount::new(10u128.pow(18)));
        assert_eq!(unit.parse("0").unwrap(), Amount::ZERO);
        assert!(unit.parse("-1").is_err());
        assert!(unit.parse("abc").is_err());
        assert!(unit.parse("0.0000000000000000001").is_err());
    }

    #[test]
    fn test_display_in_native_units() {
        let unit = NativeUnit::rbtc();
        let price = Amount::new(100_000_000_000_000);

        assert_eq!(price.display_in(&unit).to_string(), "0.0001 RBTC");
        assert_eq!(
            Amount::MAX.display_in(&unit).to_string(),
            format!("{} (smallest RBTC units)", u128::MAX)
        );
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let amount = Amount::new(10u128.pow(22));
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"10000000000000000000000\"");

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<Amount>("\"-5\"").is_err());
    }

    #[test]
    fn test_sum_of_amounts() {
        let total: Amount = [Amount::new(1), Amount::new(2), Amount::new(3)]
            .into_iter()
            .sum();
        assert_eq!(total, Amount::new(6));
    }
}
