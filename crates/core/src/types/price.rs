//! Whole-won amounts.
//!
//! The storefront sells in KRW only, which has no minor unit, so amounts are
//! plain integers. Arithmetic is checked: an order total that would overflow is
//! rejected instead of wrapping.

use core::fmt;

use serde::{Deserialize, Serialize};

/// An amount of Korean won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Krw(i64);

impl Krw {
    /// Zero won.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a whole number of won.
    #[must_use]
    pub const fn new(won: i64) -> Self {
        Self(won)
    }

    /// Get the underlying number of won.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Multiply a unit price by a quantity, returning `None` on overflow.
    #[must_use]
    pub fn checked_mul(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(quantity).map(Self)
    }

    /// Add two amounts, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl From<i64> for Krw {
    fn from(won: i64) -> Self {
        Self(won)
    }
}

impl From<Krw> for i64 {
    fn from(amount: Krw) -> Self {
        amount.0
    }
}

impl fmt::Display for Krw {
    /// Formats as `₩100,000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}₩{grouped}")
    }
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    KRW,
}

impl CurrencyCode {
    /// The ISO code as stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::KRW => "KRW",
        }
    }

    /// The currency identifier the payment gateway expects.
    #[must_use]
    pub const fn gateway_code(&self) -> &'static str {
        match self {
            Self::KRW => "CURRENCY_KRW",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Krw::new(100_000).to_string(), "₩100,000");
        assert_eq!(Krw::new(999).to_string(), "₩999");
        assert_eq!(Krw::new(1_234_567).to_string(), "₩1,234,567");
        assert_eq!(Krw::ZERO.to_string(), "₩0");
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(Krw::new(25_000).checked_mul(4), Some(Krw::new(100_000)));
        assert_eq!(Krw::new(i64::MAX).checked_mul(2), None);
        assert_eq!(Krw::new(i64::MAX).checked_add(Krw::new(1)), None);
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(CurrencyCode::KRW.as_str(), "KRW");
        assert_eq!(CurrencyCode::KRW.gateway_code(), "CURRENCY_KRW");
    }
}
