//! Reconciliation properties: idempotence, precedence, the amount gate and
//! concurrent updates.

#![allow(clippy::unwrap_used)]

use respace_core::reconcile::{PaymentUpdate, normalize_polled, normalize_webhook};
use respace_core::{OrderStatus, PaymentStatus, StoredStatus};
use respace_integration_tests::{Payments, TestApp};
use respace_storefront::services::ReconcileError;

fn polled_update(payment_id: &str, status: &str, amount: i64) -> PaymentUpdate {
    PaymentUpdate::new(payment_id)
        .with_status(normalize_polled(status))
        .with_observed_amount(Some(amount))
}

#[tokio::test]
async fn test_applying_the_same_update_is_idempotent() {
    let app = TestApp::new();
    let (order_id, payment_id) = app.prepared_order(100_000).await;
    let update = polled_update(&payment_id, "PAID", 100_000);

    let first = app.engine().apply_payment_update(&update).await.unwrap();
    assert!(first.order_changed);
    assert!(first.payment_status_changed);
    let order_after_one = app.order(order_id).await;
    let payment_after_one = app.payment(&payment_id).await;

    for _ in 0..4 {
        let again = app.engine().apply_payment_update(&update).await.unwrap();
        assert!(!again.order_changed);
        assert!(!again.payment_status_changed);
        assert!(!again.payment_inserted);
        assert_eq!(again.order_status, first.order_status);
    }

    let order = app.order(order_id).await;
    let payment = app.payment(&payment_id).await;
    assert_eq!(order.status, order_after_one.status);
    assert_eq!(order.updated_at, order_after_one.updated_at);
    assert_eq!(payment.status, payment_after_one.status);
    assert_eq!(payment.amount_krw, payment_after_one.amount_krw);
    assert_eq!(app.store.payment_count().await, 1);
}

#[tokio::test]
async fn test_status_never_regresses() {
    let app = TestApp::new();
    let (order_id, payment_id) = app.prepared_order(100_000).await;

    let sequence = [
        ("PENDING", OrderStatus::Pending),
        ("VIRTUAL_ACCOUNT_ISSUED", OrderStatus::Ready),
        ("PENDING", OrderStatus::Ready),
        ("PAID", OrderStatus::Paid),
        ("VIRTUAL_ACCOUNT_ISSUED", OrderStatus::Paid),
        ("READY", OrderStatus::Paid),
        // Same rank: a refund after payment is real
        ("CANCELLED", OrderStatus::Cancelled),
        ("PAID", OrderStatus::Paid),
    ];

    for (status, expected) in sequence {
        app.engine()
            .apply_payment_update(&polled_update(&payment_id, status, 100_000))
            .await
            .unwrap();
        assert_eq!(
            app.order_status(order_id).await,
            StoredStatus::Known(expected),
            "after {status}"
        );
    }
}

#[tokio::test]
async fn test_unknown_polled_status_keeps_order_pending() {
    let app = TestApp::new();
    let (order_id, payment_id) = app.prepared_order(100_000).await;

    app.engine()
        .apply_payment_update(&polled_update(&payment_id, "SOMETHING_NEW", 100_000))
        .await
        .unwrap();

    assert_eq!(
        app.order_status(order_id).await,
        StoredStatus::Known(OrderStatus::Pending)
    );
    assert_eq!(
        app.payment_status(&payment_id).await,
        StoredStatus::Known(PaymentStatus::Processing)
    );
}

#[tokio::test]
async fn test_amount_gate_is_exclusive() {
    let app = TestApp::new();
    let (order_id, payment_id) = app.prepared_order(50_000).await;
    let before = app.order(order_id).await;

    let err = app
        .engine()
        .apply_payment_update(&polled_update(&payment_id, "PAID", 49_000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::AmountMismatch {
            expected: 50_000,
            observed: 49_000
        }
    ));

    let after = app.order(order_id).await;
    assert_eq!(after.status, before.status);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(
        app.payment_status(&payment_id).await,
        StoredStatus::Known(PaymentStatus::AmountMismatch)
    );

    // The flag outranks everything a later correct signal could bring
    app.engine()
        .apply_payment_update(&polled_update(&payment_id, "PAID", 50_000))
        .await
        .unwrap();
    assert_eq!(
        app.payment_status(&payment_id).await,
        StoredStatus::Known(PaymentStatus::AmountMismatch)
    );
    assert_eq!(
        app.order_status(order_id).await,
        StoredStatus::Known(OrderStatus::Paid)
    );
}

#[tokio::test]
async fn test_unknown_payment_without_order_is_not_found() {
    let app = TestApp::new();
    let err = app
        .engine()
        .apply_payment_update(&polled_update("pay-unknown", "PAID", 100))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::OrderNotFound));
    assert_eq!(app.store.payment_count().await, 0);
}

#[tokio::test]
async fn test_first_signal_inserts_payment_row() {
    let app = TestApp::new();
    let (order_id, _) = app.prepared_order(100_000).await;

    let outcome = app
        .engine()
        .apply_payment_update(
            &polled_update("pay-from-elsewhere", "PAID", 100_000).with_order_id(Some(order_id)),
        )
        .await
        .unwrap();
    assert!(outcome.payment_inserted);

    let payment = app.payment("pay-from-elsewhere").await;
    assert_eq!(payment.order_id, order_id);
    assert_eq!(payment.status, StoredStatus::Known(PaymentStatus::Paid));
    assert_eq!(app.store.payment_count().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_converge_on_higher_rank() {
    for _ in 0..20 {
        let app = TestApp::with_payments(Payments::WebhookOnly);
        let (order_id, payment_id) = app.prepared_order(100_000).await;

        let pending = PaymentUpdate::new(payment_id.clone())
            .with_status(normalize_webhook("Transaction.PayPending").unwrap());
        let paid = PaymentUpdate::new(payment_id.clone())
            .with_status(normalize_webhook("Transaction.Paid").unwrap());

        let a = app.engine().clone();
        let b = app.engine().clone();
        let (first, second) = tokio::join!(
            tokio::spawn(async move { a.apply_payment_update(&pending).await }),
            tokio::spawn(async move { b.apply_payment_update(&paid).await }),
        );
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        assert_eq!(
            app.order_status(order_id).await,
            StoredStatus::Known(OrderStatus::Paid)
        );
        assert_eq!(
            app.payment_status(&payment_id).await,
            StoredStatus::Known(PaymentStatus::Paid)
        );
    }
}

#[tokio::test]
async fn test_unrecognized_stored_status_is_overwritten() {
    let app = TestApp::new();
    let (order_id, payment_id) = app.prepared_order(100_000).await;
    app.store
        .set_order_status(order_id, StoredStatus::Unrecognized("legacy_hold".to_owned()))
        .await;

    app.engine()
        .apply_payment_update(&polled_update(&payment_id, "PENDING", 100_000))
        .await
        .unwrap();
    assert_eq!(
        app.order_status(order_id).await,
        StoredStatus::Known(OrderStatus::Pending)
    );
}

#[tokio::test]
async fn test_store_failure_surfaces_as_repository_error() {
    let app = TestApp::new();
    let (_, payment_id) = app.prepared_order(100_000).await;
    app.store.set_unavailable(true);

    let err = app
        .engine()
        .apply_payment_update(&polled_update(&payment_id, "PAID", 100_000))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Repository(_)));
}
