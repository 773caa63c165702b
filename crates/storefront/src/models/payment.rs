//! Payment attempts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use respace_core::{Krw, OrderId, PayMethod, PaymentStatus, StoredStatus};

/// Provider name stored on every payment row.
pub const PROVIDER_PORTONE: &str = "portone";

/// A payment attempt created by checkout preparation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub payment_id: String,
    pub order_id: OrderId,
    pub amount: Krw,
    pub pay_method: PayMethod,
}

/// A payment row.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub payment_id: String,
    pub order_id: OrderId,
    pub provider: String,
    pub provider_payment_id: Option<String>,
    pub pay_method: Option<String>,
    pub amount_krw: i64,
    pub currency: String,
    pub status: StoredStatus<PaymentStatus>,
    #[serde(skip_serializing)]
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The part of a payment shown to buyers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct PaymentSummary {
    pub provider: String,
    pub status: StoredStatus<PaymentStatus>,
    pub amount_krw: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentSummary {
    fn from(payment: &Payment) -> Self {
        Self {
            provider: payment.provider.clone(),
            status: payment.status.clone(),
            amount_krw: payment.amount_krw,
            created_at: payment.created_at,
        }
    }
}
