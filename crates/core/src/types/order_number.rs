//! Human-facing order numbers.
//!
//! Format: `ORD-YYYYMMDD-XXXXXX`, where the date is the UTC creation date and
//! `XXXXXX` is three random bytes as uppercase hex. Uniqueness is enforced by
//! the database; callers regenerate on a collision.

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "ORD-";
const DATE_LEN: usize = 8;
const SUFFIX_LEN: usize = 6;
const TOTAL_LEN: usize = PREFIX.len() + DATE_LEN + 1 + SUFFIX_LEN;

/// Errors returned when parsing an [`OrderNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderNumberError {
    /// The input does not match `ORD-YYYYMMDD-XXXXXX`.
    #[error("order number must look like ORD-YYYYMMDD-XXXXXX")]
    Malformed,
}

/// An order number such as `ORD-20260129-A1B2C3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Build an order number from a creation date and three random bytes.
    #[must_use]
    pub fn new(date: NaiveDate, random: [u8; 3]) -> Self {
        let [a, b, c] = random;
        Self(format!(
            "{PREFIX}{}-{a:02X}{b:02X}{c:02X}",
            date.format("%Y%m%d")
        ))
    }

    /// Parse an order number typed in by a customer.
    ///
    /// Surrounding whitespace is ignored and the hex suffix is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`OrderNumberError::Malformed`] if the input does not match the format.
    pub fn parse(s: &str) -> Result<Self, OrderNumberError> {
        let s = s.trim().to_ascii_uppercase();
        if s.len() != TOTAL_LEN {
            return Err(OrderNumberError::Malformed);
        }
        let rest = s.strip_prefix(PREFIX).ok_or(OrderNumberError::Malformed)?;
        let (date, suffix) = rest.split_once('-').ok_or(OrderNumberError::Malformed)?;

        if date.len() != DATE_LEN || NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
            return Err(OrderNumberError::Malformed);
        }
        if suffix.len() != SUFFIX_LEN || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(OrderNumberError::Malformed);
        }

        Ok(Self(s))
    }

    /// Returns the order number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = OrderNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderNumber> for String {
    fn from(number: OrderNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 29).unwrap()
    }

    #[test]
    fn test_new_formats_uppercase_hex() {
        let number = OrderNumber::new(date(), [0x0a, 0xbc, 0xff]);
        assert_eq!(number.as_str(), "ORD-20260129-0ABCFF");
    }

    #[test]
    fn test_generated_numbers_parse() {
        let number = OrderNumber::new(date(), [1, 2, 3]);
        assert_eq!(OrderNumber::parse(number.as_str()).unwrap(), number);
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_whitespace() {
        let number = OrderNumber::parse("  ord-20260129-a1b2c3 ").unwrap();
        assert_eq!(number.as_str(), "ORD-20260129-A1B2C3");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "",
            "ORD-20260129",
            "ORD-20261329-A1B2C3",
            "ORD-20260129-A1B2CZ",
            "ORX-20260129-A1B2C3",
            "ORD-20260129-A1B2C3D",
        ] {
            assert_eq!(
                OrderNumber::parse(input),
                Err(OrderNumberError::Malformed),
                "{input}"
            );
        }
    }
}
