//! Status enums for orders and payment attempts.
//!
//! Both vocabularies are stored as lowercase `snake_case` text. Rows written by
//! older code (or by hand) may hold a value neither enum knows, so reads go
//! through [`StoredStatus`], which keeps the raw text instead of failing.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not part of a vocabulary.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} status: {value}")]
pub struct UnknownStatus {
    kind: &'static str,
    value: String,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created by checkout, waiting for payment.
    #[default]
    Pending,
    /// Virtual account issued, waiting for the deposit.
    Ready,
    Paid,
    Cancelled,
    PartialCancelled,
    Failed,
    /// The gateway reported a different amount than the order total.
    AmountMismatch,
}

impl OrderStatus {
    /// Every order status, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Ready,
        Self::Paid,
        Self::Cancelled,
        Self::PartialCancelled,
        Self::Failed,
        Self::AmountMismatch,
    ];

    /// The stored text form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::PartialCancelled => "partial_cancelled",
            Self::Failed => "failed",
            Self::AmountMismatch => "amount_mismatch",
        }
    }
}

/// Payment attempt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Row inserted by checkout preparation; the buyer has not paid yet.
    #[default]
    Created,
    Pending,
    /// The gateway reported a status this system has no mapping for.
    Processing,
    Ready,
    Paid,
    Cancelled,
    PartialCancelled,
    Failed,
    AmountMismatch,
}

impl PaymentStatus {
    /// Every payment status, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Created,
        Self::Pending,
        Self::Processing,
        Self::Ready,
        Self::Paid,
        Self::Cancelled,
        Self::PartialCancelled,
        Self::Failed,
        Self::AmountMismatch,
    ];

    /// The stored text form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::PartialCancelled => "partial_cancelled",
            Self::Failed => "failed",
            Self::AmountMismatch => "amount_mismatch",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "order",
                value: s.to_owned(),
            })
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus {
                kind: "payment",
                value: s.to_owned(),
            })
    }
}

/// A status value as read from storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoredStatus<S> {
    /// A value from the vocabulary.
    Known(S),
    /// Text the vocabulary does not contain.
    Unrecognized(String),
}

impl<S: FromStr> StoredStatus<S> {
    /// Interpret raw stored text. Never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.parse()
            .map_or_else(|_| Self::Unrecognized(raw.to_owned()), Self::Known)
    }
}

impl<S: Copy> StoredStatus<S> {
    /// The known status, if any.
    #[must_use]
    pub const fn known(&self) -> Option<S> {
        match self {
            Self::Known(status) => Some(*status),
            Self::Unrecognized(_) => None,
        }
    }
}

impl<S> From<S> for StoredStatus<S> {
    fn from(status: S) -> Self {
        Self::Known(status)
    }
}

impl<S: fmt::Display> fmt::Display for StoredStatus<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(status) => status.fmt(f),
            Self::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

impl<S: Serialize> Serialize for StoredStatus<S> {
    fn serialize<Ser: serde::Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        match self {
            Self::Known(status) => status.serialize(serializer),
            Self::Unrecognized(raw) => serializer.serialize_str(raw),
        }
    }
}

/// Payment method offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayMethod {
    #[default]
    Card,
    Transfer,
    VirtualAccount,
}

impl PayMethod {
    /// The gateway's name for this method.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "CARD",
            Self::Transfer => "TRANSFER",
            Self::VirtualAccount => "VIRTUAL_ACCOUNT",
        }
    }
}

impl fmt::Display for PayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Statuses are TEXT columns. Writes go through the known enums; reads decode
// into `StoredStatus` so a foreign value never fails a query.
#[cfg(feature = "postgres")]
macro_rules! text_status_encode {
    ($($name:ty),+) => {$(
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <&str as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <&str as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <&str as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    )+};
}

#[cfg(feature = "postgres")]
text_status_encode!(OrderStatus, PaymentStatus);

#[cfg(feature = "postgres")]
impl<S> ::sqlx::Type<::sqlx::Postgres> for StoredStatus<S> {
    fn type_info() -> ::sqlx::postgres::PgTypeInfo {
        <&str as ::sqlx::Type<::sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
        <&str as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r, S: FromStr> ::sqlx::Decode<'r, ::sqlx::Postgres> for StoredStatus<S> {
    fn decode(value: ::sqlx::postgres::PgValueRef<'r>) -> Result<Self, ::sqlx::error::BoxDynError> {
        let raw = <&str as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(raw))
    }
}
