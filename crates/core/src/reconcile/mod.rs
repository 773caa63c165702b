//! Payment reconciliation rules.
//!
//! The gateway tells us about a payment twice: once when the buyer's browser
//! reports completion (we poll the gateway) and once via webhook. Either can
//! arrive first, either can be retried, and webhooks carry no ordering
//! guarantee. The rules here make every interleaving converge:
//!
//! 1. [`normalize`] maps the gateway's two vocabularies onto one [`StatusPair`].
//! 2. [`precedence`] ranks statuses; an update never lowers the rank.
//! 3. [`plan`] decides, for a locked snapshot of an order and its payment
//!    row, exactly which writes an update produces. Amount disagreement is a
//!    hard gate that leaves the order untouched.
//!
//! Storage backends call [`plan()`] while holding whatever lock makes the
//! read-decide-write atomic, then perform the writes it returns.

pub mod normalize;
pub mod plan;
pub mod precedence;

use serde::{Deserialize, Serialize};

use crate::types::{OrderStatus, PaymentStatus};

pub use normalize::{normalize_polled, normalize_webhook};
pub use plan::{
    OrderSnapshot, PaymentSnapshot, PaymentUpdate, PaymentWrite, ReconcileOutcome, ReconcilePlan,
    plan, resolve_order_id,
};
pub use precedence::{Ranked, UNRECOGNIZED_RANK, should_apply};

/// The internal `(payment status, order status)` tuple derived from a
/// gateway signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusPair {
    pub payment: PaymentStatus,
    pub order: OrderStatus,
}

impl StatusPair {
    /// Build a pair.
    #[must_use]
    pub const fn new(payment: PaymentStatus, order: OrderStatus) -> Self {
        Self { payment, order }
    }
}
