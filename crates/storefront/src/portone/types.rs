//! `PortOne` V2 payloads, decoded at the boundary.
//!
//! See: <https://developers.portone.io/api/rest-v2/payment>

use serde::Deserialize;
use serde_json::Value;

/// Result of polling a payment.
#[derive(Debug, Clone, PartialEq)]
pub enum PolledPayment {
    /// `PortOne` knows the payment.
    Recognized {
        /// Raw status token, e.g. `PAID`.
        status: String,
        /// `amount.total` in whole won.
        amount_total: i64,
        transaction_id: Option<String>,
        /// The full response body.
        raw: Value,
    },
    /// `PortOne` has no payment with this id.
    Unrecognized,
}

impl PolledPayment {
    /// Decode a successful `GET /payments/{id}` body.
    ///
    /// # Errors
    ///
    /// Fails if `status` or `amount.total` is missing. A payment without a
    /// collected amount can't pass the amount check, so it is never
    /// `Recognized`.
    pub fn from_response(raw: Value) -> Result<Self, serde_json::Error> {
        let body = PaymentResponse::deserialize(&raw)?;
        Ok(Self::Recognized {
            status: body.status,
            amount_total: body.amount.total,
            transaction_id: body.transaction_id,
            raw,
        })
    }
}

/// An authenticated webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    Recognized {
        /// e.g. `Transaction.Paid`.
        event_type: String,
        payment_id: Option<String>,
        transaction_id: Option<String>,
        raw: Value,
    },
    /// Not JSON, or no `type` field.
    Unrecognized,
}

impl WebhookEvent {
    /// Decode a verified body. Never fails; anything unexpected, including
    /// bytes that are not UTF-8 JSON, is `Unrecognized`.
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        let Ok(raw) = serde_json::from_slice::<Value>(body) else {
            return Self::Unrecognized;
        };
        let Ok(envelope) = WebhookEnvelope::deserialize(&raw) else {
            return Self::Unrecognized;
        };
        let data = envelope.data.unwrap_or_default();
        Self::Recognized {
            event_type: envelope.event_type,
            payment_id: data.payment_id,
            transaction_id: data.transaction_id,
            raw,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    status: String,
    amount: PaymentAmount,
    #[serde(default)]
    transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentAmount {
    total: i64,
}

/// Error body of a non-2xx response.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorResponse {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<WebhookData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    #[serde(default)]
    payment_id: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_response_decodes() {
        let raw = json!({
            "status": "PAID",
            "id": "pay-1",
            "transactionId": "tx-9",
            "amount": {"total": 100_000, "paid": 100_000},
            "currency": "KRW"
        });
        let PolledPayment::Recognized {
            status,
            amount_total,
            transaction_id,
            raw: kept,
        } = PolledPayment::from_response(raw.clone()).unwrap()
        else {
            panic!("expected recognized");
        };
        assert_eq!(status, "PAID");
        assert_eq!(amount_total, 100_000);
        assert_eq!(transaction_id.as_deref(), Some("tx-9"));
        assert_eq!(kept, raw);
    }

    #[test]
    fn test_payment_response_without_status_fails() {
        assert!(PolledPayment::from_response(json!({"id": "pay-1"})).is_err());
    }

    #[test]
    fn test_payment_response_without_amount_fails() {
        assert!(PolledPayment::from_response(json!({"status": "PAID"})).is_err());
        assert!(PolledPayment::from_response(json!({"status": "PAID", "amount": {}})).is_err());
        assert!(
            PolledPayment::from_response(json!({"status": "PAID", "amount": {"total": null}}))
                .is_err()
        );
    }

    #[test]
    fn test_webhook_event_parse() {
        let event = WebhookEvent::parse(
            br#"{"type":"Transaction.Paid","timestamp":"2026-01-29T00:00:00Z","data":{"paymentId":"pay-1","storeId":"s"}}"#,
        );
        let WebhookEvent::Recognized {
            event_type,
            payment_id,
            ..
        } = event
        else {
            panic!("expected recognized");
        };
        assert_eq!(event_type, "Transaction.Paid");
        assert_eq!(payment_id.as_deref(), Some("pay-1"));
    }

    #[test]
    fn test_webhook_event_without_data() {
        let event = WebhookEvent::parse(br#"{"type":"BillingKey.Issued"}"#);
        assert!(matches!(
            event,
            WebhookEvent::Recognized {
                payment_id: None,
                ..
            }
        ));
    }

    #[test]
    fn test_webhook_event_garbage_is_unrecognized() {
        assert_eq!(WebhookEvent::parse(b"not json"), WebhookEvent::Unrecognized);
        assert_eq!(WebhookEvent::parse(br#"{"data":{}}"#), WebhookEvent::Unrecognized);
        assert_eq!(WebhookEvent::parse(&[0xff, 0xfe]), WebhookEvent::Unrecognized);
    }
}
