//! Gateway status normalization.
//!
//! The gateway's polling API and its webhooks name the same real-world events
//! differently (`PAID` vs `Transaction.Paid`). Each vocabulary gets its own
//! table; both tables produce the same [`StatusPair`] for equivalent events.

use super::StatusPair;
use crate::types::{OrderStatus, PaymentStatus};

const PENDING: StatusPair = StatusPair::new(PaymentStatus::Pending, OrderStatus::Pending);
const READY: StatusPair = StatusPair::new(PaymentStatus::Ready, OrderStatus::Ready);
const PAID: StatusPair = StatusPair::new(PaymentStatus::Paid, OrderStatus::Paid);
const FAILED: StatusPair = StatusPair::new(PaymentStatus::Failed, OrderStatus::Failed);
const PARTIAL_CANCELLED: StatusPair =
    StatusPair::new(PaymentStatus::PartialCancelled, OrderStatus::PartialCancelled);
const CANCELLED: StatusPair = StatusPair::new(PaymentStatus::Cancelled, OrderStatus::Cancelled);

/// Pair used for polled statuses missing from [`POLLED_STATUSES`].
pub const POLLED_FALLBACK: StatusPair =
    StatusPair::new(PaymentStatus::Processing, OrderStatus::Pending);

/// Payment statuses returned by `GET /payments/{id}`.
pub const POLLED_STATUSES: &[(&str, StatusPair)] = &[
    ("READY", PENDING),
    ("PENDING", PENDING),
    ("VIRTUAL_ACCOUNT_ISSUED", READY),
    ("PAID", PAID),
    ("FAILED", FAILED),
    ("PARTIAL_CANCELLED", PARTIAL_CANCELLED),
    ("CANCELLED", CANCELLED),
];

/// Webhook `type` values that describe a payment status change.
///
/// Everything else the gateway sends (`Transaction.CancelPending`,
/// `BillingKey.*`, ...) is acknowledged and ignored.
pub const WEBHOOK_EVENTS: &[(&str, StatusPair)] = &[
    ("Transaction.Ready", PENDING),
    ("Transaction.PayPending", PENDING),
    ("Transaction.VirtualAccountIssued", READY),
    ("Transaction.Paid", PAID),
    ("Transaction.Failed", FAILED),
    ("Transaction.PartialCancelled", PARTIAL_CANCELLED),
    ("Transaction.Cancelled", CANCELLED),
];

fn lookup(table: &[(&str, StatusPair)], key: &str) -> Option<StatusPair> {
    table
        .iter()
        .find_map(|(name, pair)| (*name == key).then_some(*pair))
}

/// Normalize a polled payment status. Unknown values map to
/// [`POLLED_FALLBACK`] rather than being rejected.
#[must_use]
pub fn normalize_polled(status: &str) -> StatusPair {
    lookup(POLLED_STATUSES, status).unwrap_or(POLLED_FALLBACK)
}

/// Normalize a webhook event type. `None` means "acknowledge, do nothing".
#[must_use]
pub fn normalize_webhook(event_type: &str) -> Option<StatusPair> {
    lookup(WEBHOOK_EVENTS, event_type)
}
