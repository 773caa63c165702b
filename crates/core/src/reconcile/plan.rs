//! The reconciliation decision.
//!
//! [`plan`] is pure: given the locked order row, the locked payment row (if
//! any) and an incoming update, it returns the writes to perform. Storage
//! backends own the locking and the writes; this module owns the rules.

use serde::Serialize;

use super::StatusPair;
use super::precedence::should_apply;
use crate::types::{OrderId, OrderStatus, PaymentStatus, StoredStatus};

/// The order row as read under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub total_krw: i64,
    pub status: StoredStatus<OrderStatus>,
}

/// The payment row as read under lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSnapshot {
    pub order_id: OrderId,
    pub amount_krw: i64,
    pub status: StoredStatus<PaymentStatus>,
}

/// A normalized signal about one payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub payment_id: String,
    /// Explicit target order. Falls back to the payment row's order.
    pub order_id: Option<OrderId>,
    pub payment_status: Option<PaymentStatus>,
    pub order_status: Option<OrderStatus>,
    /// Amount the gateway reports as collected.
    pub observed_amount: Option<i64>,
    /// The gateway's own transaction id, when it reports one.
    pub provider_payment_id: Option<String>,
    /// Last-seen provider payload, stored for audit.
    pub raw_payload: serde_json::Value,
}

impl PaymentUpdate {
    /// An update for `payment_id` carrying no status and no amount.
    #[must_use]
    pub fn new(payment_id: impl Into<String>) -> Self {
        Self {
            payment_id: payment_id.into(),
            order_id: None,
            payment_status: None,
            order_status: None,
            observed_amount: None,
            provider_payment_id: None,
            raw_payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_order_id(mut self, order_id: Option<OrderId>) -> Self {
        self.order_id = order_id;
        self
    }

    #[must_use]
    pub fn with_status(mut self, pair: StatusPair) -> Self {
        self.payment_status = Some(pair.payment);
        self.order_status = Some(pair.order);
        self
    }

    #[must_use]
    pub fn with_observed_amount(mut self, amount: Option<i64>) -> Self {
        self.observed_amount = amount;
        self
    }

    #[must_use]
    pub fn with_provider_payment_id(mut self, id: Option<String>) -> Self {
        self.provider_payment_id = id;
        self
    }

    #[must_use]
    pub fn with_raw_payload(mut self, raw: serde_json::Value) -> Self {
        self.raw_payload = raw;
        self
    }
}

/// Which order an update targets: the explicit id, else the payment row's.
#[must_use]
pub fn resolve_order_id(
    update: &PaymentUpdate,
    payment: Option<&PaymentSnapshot>,
) -> Option<OrderId> {
    update.order_id.or_else(|| payment.map(|p| p.order_id))
}

/// A write to the payments table. The raw payload is always written, and the
/// provider payment id whenever the update carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentWrite {
    /// First signal for this payment id.
    Insert {
        status: PaymentStatus,
        amount_krw: i64,
    },
    /// Existing row. `None` fields keep their stored value.
    Update {
        status: Option<PaymentStatus>,
        amount_krw: Option<i64>,
    },
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub order_id: OrderId,
    pub order_status: StoredStatus<OrderStatus>,
    pub payment_status: StoredStatus<PaymentStatus>,
    pub order_changed: bool,
    pub payment_status_changed: bool,
    pub payment_inserted: bool,
}

/// What to do with an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePlan {
    /// Amounts agree; perform the writes.
    Apply {
        /// New order status, when it passes precedence and differs.
        order: Option<OrderStatus>,
        payment: PaymentWrite,
        outcome: ReconcileOutcome,
    },
    /// Amounts disagree. The order is not touched; an existing payment row
    /// is flagged, then the caller fails the update.
    AmountMismatch {
        expected: i64,
        observed: i64,
        payment: Option<PaymentWrite>,
    },
}

/// Decide the writes for `update` against locked rows.
///
/// `order` must be the order [`resolve_order_id`] selected.
#[must_use]
pub fn plan(
    order: &OrderSnapshot,
    payment: Option<&PaymentSnapshot>,
    update: &PaymentUpdate,
) -> ReconcilePlan {
    if let Some(observed) = update.observed_amount
        && observed != order.total_krw
    {
        return ReconcilePlan::AmountMismatch {
            expected: order.total_krw,
            observed,
            payment: payment.map(|_| PaymentWrite::Update {
                status: Some(PaymentStatus::AmountMismatch),
                amount_krw: Some(observed),
            }),
        };
    }

    let order_write = update
        .order_status
        .filter(|next| should_apply(&order.status, next))
        .filter(|next| order.status.known() != Some(*next));
    let order_status = order_write.map_or_else(|| order.status.clone(), StoredStatus::Known);

    let (payment_write, payment_status, payment_status_changed) = match payment {
        Some(current) => {
            let status = update
                .payment_status
                .filter(|next| should_apply(&current.status, next))
                .filter(|next| current.status.known() != Some(*next));
            let write = PaymentWrite::Update {
                status,
                amount_krw: update.observed_amount,
            };
            let after = status.map_or_else(|| current.status.clone(), StoredStatus::Known);
            (write, after, status.is_some())
        }
        None => {
            let status = update.payment_status.unwrap_or_default();
            let write = PaymentWrite::Insert {
                status,
                amount_krw: update.observed_amount.unwrap_or(order.total_krw),
            };
            (write, StoredStatus::Known(status), true)
        }
    };

    ReconcilePlan::Apply {
        order: order_write,
        payment: payment_write,
        outcome: ReconcileOutcome {
            order_id: order.order_id,
            order_status,
            payment_status,
            order_changed: order_write.is_some(),
            payment_status_changed,
            payment_inserted: payment.is_none(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::reconcile::normalize::{normalize_polled, normalize_webhook};

    fn order(status: OrderStatus, total: i64) -> OrderSnapshot {
        OrderSnapshot {
            order_id: OrderId::generate(),
            total_krw: total,
            status: status.into(),
        }
    }

    fn payment(order: &OrderSnapshot, status: PaymentStatus) -> PaymentSnapshot {
        PaymentSnapshot {
            order_id: order.order_id,
            amount_krw: order.total_krw,
            status: status.into(),
        }
    }

    fn paid(amount: i64) -> PaymentUpdate {
        PaymentUpdate::new("pay-1")
            .with_status(normalize_polled("PAID"))
            .with_observed_amount(Some(amount))
    }

    /// Apply a plan to the snapshots the way a store would.
    fn apply(order: &mut OrderSnapshot, payment: &mut Option<PaymentSnapshot>, update: &PaymentUpdate) {
        match plan(order, payment.as_ref(), update) {
            ReconcilePlan::Apply {
                order: order_write,
                payment: payment_write,
                ..
            } => {
                if let Some(status) = order_write {
                    order.status = status.into();
                }
                match payment_write {
                    PaymentWrite::Insert { status, amount_krw } => {
                        *payment = Some(PaymentSnapshot {
                            order_id: order.order_id,
                            amount_krw,
                            status: status.into(),
                        });
                    }
                    PaymentWrite::Update { status, amount_krw } => {
                        let row = payment.as_mut().unwrap();
                        if let Some(status) = status {
                            row.status = status.into();
                        }
                        if let Some(amount) = amount_krw {
                            row.amount_krw = amount;
                        }
                    }
                }
            }
            ReconcilePlan::AmountMismatch { .. } => panic!("unexpected mismatch"),
        }
    }

    #[test]
    fn test_resolve_prefers_explicit_order_id() {
        let o = order(OrderStatus::Pending, 100);
        let p = payment(&o, PaymentStatus::Created);
        let explicit = OrderId::generate();

        let update = PaymentUpdate::new("pay-1").with_order_id(Some(explicit));
        assert_eq!(resolve_order_id(&update, Some(&p)), Some(explicit));

        let update = PaymentUpdate::new("pay-1");
        assert_eq!(resolve_order_id(&update, Some(&p)), Some(o.order_id));
        assert_eq!(resolve_order_id(&update, None), None);
    }

    #[test]
    fn test_paid_updates_both_rows() {
        let o = order(OrderStatus::Pending, 100_000);
        let p = payment(&o, PaymentStatus::Created);

        let ReconcilePlan::Apply {
            order: order_write,
            payment: payment_write,
            outcome,
        } = plan(&o, Some(&p), &paid(100_000))
        else {
            panic!("expected apply");
        };

        assert_eq!(order_write, Some(OrderStatus::Paid));
        assert_eq!(
            payment_write,
            PaymentWrite::Update {
                status: Some(PaymentStatus::Paid),
                amount_krw: Some(100_000),
            }
        );
        assert!(outcome.order_changed);
        assert!(outcome.payment_status_changed);
        assert!(!outcome.payment_inserted);
        assert_eq!(outcome.order_status.known(), Some(OrderStatus::Paid));
    }

    #[test]
    fn test_amount_mismatch_never_touches_order() {
        let o = order(OrderStatus::Pending, 50_000);
        let p = payment(&o, PaymentStatus::Created);

        let result = plan(&o, Some(&p), &paid(49_000));
        assert_eq!(
            result,
            ReconcilePlan::AmountMismatch {
                expected: 50_000,
                observed: 49_000,
                payment: Some(PaymentWrite::Update {
                    status: Some(PaymentStatus::AmountMismatch),
                    amount_krw: Some(49_000),
                }),
            }
        );
    }

    #[test]
    fn test_amount_mismatch_without_payment_row_writes_nothing() {
        let o = order(OrderStatus::Pending, 50_000);
        let ReconcilePlan::AmountMismatch { payment, .. } = plan(&o, None, &paid(1)) else {
            panic!("expected mismatch");
        };
        assert_eq!(payment, None);
    }

    #[test]
    fn test_mismatch_gate_ignores_precedence() {
        // Even an order already at rank 3 with a rank 3 update is gated.
        let o = order(OrderStatus::Paid, 50_000);
        let p = payment(&o, PaymentStatus::Paid);
        assert!(matches!(
            plan(&o, Some(&p), &paid(50_001)),
            ReconcilePlan::AmountMismatch { .. }
        ));
    }

    #[test]
    fn test_stale_pending_does_not_regress_paid() {
        let o = order(OrderStatus::Paid, 100);
        let p = payment(&o, PaymentStatus::Paid);
        let update = PaymentUpdate::new("pay-1")
            .with_status(normalize_webhook("Transaction.PayPending").unwrap());

        let ReconcilePlan::Apply {
            order: order_write,
            payment: payment_write,
            outcome,
        } = plan(&o, Some(&p), &update)
        else {
            panic!("expected apply");
        };
        assert_eq!(order_write, None);
        assert_eq!(
            payment_write,
            PaymentWrite::Update {
                status: None,
                amount_krw: None,
            }
        );
        assert!(!outcome.order_changed);
        assert_eq!(outcome.payment_status.known(), Some(PaymentStatus::Paid));
    }

    #[test]
    fn test_refund_overwrites_paid() {
        let o = order(OrderStatus::Paid, 100);
        let p = payment(&o, PaymentStatus::Paid);
        let update = PaymentUpdate::new("pay-1").with_status(normalize_polled("CANCELLED"));

        let ReconcilePlan::Apply { outcome, .. } = plan(&o, Some(&p), &update) else {
            panic!("expected apply");
        };
        assert_eq!(outcome.order_status.known(), Some(OrderStatus::Cancelled));
        assert_eq!(outcome.payment_status.known(), Some(PaymentStatus::Cancelled));
    }

    #[test]
    fn test_mismatch_is_sticky() {
        let o = order(OrderStatus::Pending, 100);
        let p = payment(&o, PaymentStatus::AmountMismatch);

        let ReconcilePlan::Apply {
            order: order_write,
            outcome,
            ..
        } = plan(&o, Some(&p), &paid(100))
        else {
            panic!("expected apply");
        };
        // The order may still move; the flagged payment row stays flagged.
        assert_eq!(order_write, Some(OrderStatus::Paid));
        assert_eq!(
            outcome.payment_status.known(),
            Some(PaymentStatus::AmountMismatch)
        );
    }

    #[test]
    fn test_first_signal_inserts_payment_row() {
        let o = order(OrderStatus::Pending, 7_000);
        let update = PaymentUpdate::new("pay-1")
            .with_order_id(Some(o.order_id))
            .with_status(normalize_webhook("Transaction.VirtualAccountIssued").unwrap());

        let ReconcilePlan::Apply {
            payment: payment_write,
            outcome,
            ..
        } = plan(&o, None, &update)
        else {
            panic!("expected apply");
        };
        assert_eq!(
            payment_write,
            PaymentWrite::Insert {
                status: PaymentStatus::Ready,
                amount_krw: 7_000,
            }
        );
        assert!(outcome.payment_inserted);
        assert_eq!(outcome.order_status.known(), Some(OrderStatus::Ready));
    }

    #[test]
    fn test_insert_without_status_is_created() {
        let o = order(OrderStatus::Pending, 7_000);
        let update = PaymentUpdate::new("pay-1").with_observed_amount(Some(7_000));
        let ReconcilePlan::Apply { payment, .. } = plan(&o, None, &update) else {
            panic!("expected apply");
        };
        assert_eq!(
            payment,
            PaymentWrite::Insert {
                status: PaymentStatus::Created,
                amount_krw: 7_000,
            }
        );
    }

    #[test]
    fn test_unrecognized_stored_status_is_overwritten() {
        let mut o = order(OrderStatus::Pending, 100);
        o.status = StoredStatus::Unrecognized("shipped".to_owned());
        let update = PaymentUpdate::new("pay-1").with_status(normalize_polled("READY"));

        let ReconcilePlan::Apply { order, .. } = plan(&o, None, &update) else {
            panic!("expected apply");
        };
        assert_eq!(order, Some(OrderStatus::Pending));
    }

    #[test]
    fn test_idempotent() {
        let mut o = order(OrderStatus::Pending, 100);
        let mut p = Some(payment(&o, PaymentStatus::Created));
        let update = paid(100);

        apply(&mut o, &mut p, &update);
        let once = (o.clone(), p.clone());
        for _ in 0..5 {
            apply(&mut o, &mut p, &update);
        }
        assert_eq!((o, p), once);
    }

    #[test]
    fn test_order_of_arrival_does_not_matter() {
        let signals = [
            normalize_webhook("Transaction.PayPending").unwrap(),
            normalize_polled("PAID"),
            normalize_webhook("Transaction.Ready").unwrap(),
        ];
        let base = order(OrderStatus::Pending, 100);

        let mut results = Vec::new();
        for perm in [[0, 1, 2], [1, 0, 2], [2, 1, 0], [1, 2, 0]] {
            let mut o = base.clone();
            let mut p = Some(payment(&o, PaymentStatus::Created));
            for i in perm {
                apply(
                    &mut o,
                    &mut p,
                    &PaymentUpdate::new("pay-1").with_status(signals[i]),
                );
            }
            results.push((o.status, p.map(|p| p.status)));
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0].0.known(), Some(OrderStatus::Paid));
    }
}
