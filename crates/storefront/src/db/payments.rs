//! Payment queries and the locked reconciliation transaction.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::warn;

use respace_core::reconcile::{
    OrderSnapshot, PaymentSnapshot, PaymentUpdate, PaymentWrite, ReconcileOutcome,
    ReconcilePlan, plan,
};
use respace_core::{OrderId, OrderStatus, PaymentStatus, StoredStatus};

use super::{PaymentRepository, PgStore, ReconcileResult, RepositoryError, conflict_on_unique};
use crate::models::payment::PROVIDER_PORTONE;
use crate::models::{NewPayment, Payment};

const PAYMENT_COLUMNS: &str = "payment_id, order_id, provider, provider_payment_id, pay_method, \
     amount_krw, currency, status, raw_payload, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct LockedOrder {
    id: OrderId,
    total_price_krw: i64,
    status: StoredStatus<OrderStatus>,
}

#[derive(sqlx::FromRow)]
struct LockedPayment {
    order_id: OrderId,
    amount_krw: i64,
    status: StoredStatus<PaymentStatus>,
}

/// The payment row as it stands after an insert attempt.
#[derive(sqlx::FromRow)]
struct InsertedPayment {
    status: StoredStatus<PaymentStatus>,
    inserted: bool,
}

#[async_trait]
impl PaymentRepository for PgStore {
    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (payment_id, order_id, provider, pay_method, amount_krw, \
                 currency, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(&payment.payment_id)
        .bind(payment.order_id)
        .bind(PROVIDER_PORTONE)
        .bind(payment.pay_method.as_str())
        .bind(payment.amount.as_i64())
        .bind(respace_core::CurrencyCode::KRW.as_str())
        .bind(PaymentStatus::Created)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "payment id"))?;

        Ok(row)
    }

    async fn find_payment(&self, payment_id: &str) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Lock order, lock payment, decide, write, commit.
    ///
    /// Every reconciliation for an order serializes on its row lock, so two
    /// signals for the same payment never both act on a stale read.
    async fn apply_payment_update(
        &self,
        update: &PaymentUpdate,
    ) -> Result<ReconcileResult, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let order_id = match update.order_id {
            Some(id) => Some(id),
            None => {
                sqlx::query_scalar::<_, OrderId>(
                    "SELECT order_id FROM payments WHERE payment_id = $1",
                )
                .bind(&update.payment_id)
                .fetch_optional(&mut *tx)
                .await?
            }
        };
        let Some(order_id) = order_id else {
            return Ok(ReconcileResult::OrderNotFound);
        };

        let Some(order) = sqlx::query_as::<_, LockedOrder>(
            "SELECT id, total_price_krw, status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(ReconcileResult::OrderNotFound);
        };

        let payment = sqlx::query_as::<_, LockedPayment>(
            "SELECT order_id, amount_krw, status FROM payments WHERE payment_id = $1 FOR UPDATE",
        )
        .bind(&update.payment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let order = OrderSnapshot {
            order_id: order.id,
            total_krw: order.total_price_krw,
            status: order.status,
        };
        let payment = payment.map(|p| PaymentSnapshot {
            order_id: p.order_id,
            amount_krw: p.amount_krw,
            status: p.status,
        });

        match plan(&order, payment.as_ref(), update) {
            ReconcilePlan::AmountMismatch {
                expected,
                observed,
                payment,
            } => {
                if let Some(write) = payment {
                    write_payment(&mut tx, order.order_id, update, write).await?;
                }
                tx.commit().await?;
                Ok(ReconcileResult::AmountMismatch { expected, observed })
            }
            ReconcilePlan::Apply {
                order: order_write,
                payment,
                outcome,
            } => {
                if let Some(status) = order_write {
                    sqlx::query("UPDATE orders SET status = $2, updated_at = now() WHERE id = $1")
                        .bind(order.order_id)
                        .bind(status)
                        .execute(&mut *tx)
                        .await?;
                }
                let inserted = write_payment(&mut tx, order.order_id, update, payment).await?;
                tx.commit().await?;
                Ok(ReconcileResult::Applied(reported(outcome, inserted)))
            }
        }
    }
}

/// Correct the planned outcome when the insert hit a row another transaction
/// committed first. That row keeps its status, so report it as stored.
fn reported(outcome: ReconcileOutcome, inserted: Option<InsertedPayment>) -> ReconcileOutcome {
    match inserted {
        Some(row) if !row.inserted => {
            warn!(
                stored_status = %row.status,
                "Payment row created concurrently, status left as stored"
            );
            ReconcileOutcome {
                payment_status: row.status,
                payment_status_changed: false,
                payment_inserted: false,
                ..outcome
            }
        }
        _ => outcome,
    }
}

/// Write the payment side of a plan. Returns the stored row for inserts.
async fn write_payment(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    update: &PaymentUpdate,
    write: PaymentWrite,
) -> Result<Option<InsertedPayment>, RepositoryError> {
    match write {
        PaymentWrite::Insert { status, amount_krw } => {
            // The order lock already serializes first inserts for this order;
            // the conflict clause covers a second order claiming the same id.
            // `xmax = 0` only for a freshly inserted tuple.
            let row = sqlx::query_as::<_, InsertedPayment>(
                "INSERT INTO payments (payment_id, order_id, provider, provider_payment_id, \
                     amount_krw, currency, status, raw_payload) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (payment_id) DO UPDATE \
                 SET raw_payload = EXCLUDED.raw_payload, updated_at = now() \
                 RETURNING status, (xmax = 0) AS inserted",
            )
            .bind(&update.payment_id)
            .bind(order_id)
            .bind(PROVIDER_PORTONE)
            .bind(&update.provider_payment_id)
            .bind(amount_krw)
            .bind(respace_core::CurrencyCode::KRW.as_str())
            .bind(status)
            .bind(&update.raw_payload)
            .fetch_one(&mut **tx)
            .await?;
            Ok(Some(row))
        }
        PaymentWrite::Update { status, amount_krw } => {
            sqlx::query(
                "UPDATE payments \
                 SET status = COALESCE($2, status), \
                     amount_krw = COALESCE($3, amount_krw), \
                     provider_payment_id = COALESCE($4, provider_payment_id), \
                     raw_payload = $5, \
                     updated_at = now() \
                 WHERE payment_id = $1",
            )
            .bind(&update.payment_id)
            .bind(status)
            .bind(amount_krw)
            .bind(&update.provider_payment_id)
            .bind(&update.raw_payload)
            .execute(&mut **tx)
            .await?;
            Ok(None)
        }
    }
}


/// The locked transaction against a real database.
///
/// ```bash
/// DATABASE_URL=postgres://localhost/respace_test \
///     cargo test -p respace-storefront -- --ignored
/// ```
#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod pg_tests {
    use std::time::Duration;

    use chrono::NaiveDate;
    use respace_core::reconcile::{normalize_polled, normalize_webhook};
    use respace_core::{Email, Krw, OrderNumber, PayMethod};
    use sqlx::PgPool;

    use super::*;
    use crate::db::OrderRepository;
    use crate::models::{Customer, NewOrder, Order};

    async fn new_order(store: &PgStore, seq: u8, total: i64) -> Order {
        store
            .insert_order(&NewOrder {
                order_number: OrderNumber::new(
                    NaiveDate::from_ymd_opt(2026, 1, 29).unwrap(),
                    [0xAB, 0xCD, seq],
                ),
                customer: Customer {
                    name: "Kim".to_owned(),
                    email: Email::parse("kim@example.com").unwrap(),
                    phone: None,
                },
                user_id: None,
                guest_token: None,
                is_cart: false,
                total: Krw::new(total),
                lines: Vec::new(),
            })
            .await
            .unwrap()
    }

    async fn prepared(store: &PgStore, seq: u8, total: i64) -> (Order, String) {
        let order = new_order(store, seq, total).await;
        let payment_id = format!("pay-{seq}");
        store
            .insert_payment(&NewPayment {
                payment_id: payment_id.clone(),
                order_id: order.id,
                amount: Krw::new(total),
                pay_method: PayMethod::Card,
            })
            .await
            .unwrap();
        (order, payment_id)
    }

    fn polled(payment_id: &str, status: &str, amount: i64) -> PaymentUpdate {
        PaymentUpdate::new(payment_id)
            .with_status(normalize_polled(status))
            .with_observed_amount(Some(amount))
    }

    async fn order_row(store: &PgStore, order_id: OrderId) -> Order {
        store.find_order(order_id).await.unwrap().unwrap()
    }

    async fn payment_row(store: &PgStore, payment_id: &str) -> Payment {
        store.find_payment(payment_id).await.unwrap().unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn test_concurrent_pending_and_paid_converge(pool: PgPool) {
        let store = PgStore::new(pool);

        for seq in 0..10 {
            let (order, payment_id) = prepared(&store, seq, 100_000).await;
            let pending = PaymentUpdate::new(payment_id.clone())
                .with_status(normalize_webhook("Transaction.PayPending").unwrap());
            let paid = PaymentUpdate::new(payment_id.clone())
                .with_status(normalize_webhook("Transaction.Paid").unwrap());

            let (a, b) = (store.clone(), store.clone());
            let (first, second) = tokio::join!(
                tokio::spawn(async move { a.apply_payment_update(&pending).await }),
                tokio::spawn(async move { b.apply_payment_update(&paid).await }),
            );
            first.unwrap().unwrap();
            second.unwrap().unwrap();

            assert_eq!(
                order_row(&store, order.id).await.status,
                StoredStatus::Known(OrderStatus::Paid)
            );
            assert_eq!(
                payment_row(&store, &payment_id).await.status,
                StoredStatus::Known(PaymentStatus::Paid)
            );
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn test_mismatch_flags_payment_and_leaves_order(pool: PgPool) {
        let store = PgStore::new(pool);
        let (order, payment_id) = prepared(&store, 1, 50_000).await;
        let before = order_row(&store, order.id).await;

        let result = store
            .apply_payment_update(&polled(&payment_id, "PAID", 49_000))
            .await
            .unwrap();
        assert_eq!(
            result,
            ReconcileResult::AmountMismatch {
                expected: 50_000,
                observed: 49_000
            }
        );

        // The flag is committed even though the update failed
        let after = order_row(&store, order.id).await;
        assert_eq!(after.status, before.status);
        assert_eq!(after.updated_at, before.updated_at);
        let payment = payment_row(&store, &payment_id).await;
        assert_eq!(
            payment.status,
            StoredStatus::Known(PaymentStatus::AmountMismatch)
        );
        assert_eq!(payment.amount_krw, 49_000);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn test_repeat_update_is_idempotent(pool: PgPool) {
        let store = PgStore::new(pool);
        let (order, payment_id) = prepared(&store, 1, 100_000).await;
        let update = polled(&payment_id, "PAID", 100_000);

        let ReconcileResult::Applied(first) = store.apply_payment_update(&update).await.unwrap()
        else {
            panic!("expected applied");
        };
        assert!(first.order_changed);
        let settled = order_row(&store, order.id).await;

        let ReconcileResult::Applied(again) = store.apply_payment_update(&update).await.unwrap()
        else {
            panic!("expected applied");
        };
        assert!(!again.order_changed);
        assert!(!again.payment_status_changed);
        assert_eq!(order_row(&store, order.id).await.updated_at, settled.updated_at);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn test_partial_update_keeps_stored_fields(pool: PgPool) {
        let store = PgStore::new(pool);
        let (_, payment_id) = prepared(&store, 1, 100_000).await;

        store
            .apply_payment_update(
                &polled(&payment_id, "VIRTUAL_ACCOUNT_ISSUED", 100_000)
                    .with_provider_payment_id(Some("tx-1".to_owned())),
            )
            .await
            .unwrap();
        // Webhook-style: no amount, no transaction id
        store
            .apply_payment_update(
                &PaymentUpdate::new(payment_id.clone())
                    .with_status(normalize_webhook("Transaction.Paid").unwrap()),
            )
            .await
            .unwrap();

        let payment = payment_row(&store, &payment_id).await;
        assert_eq!(payment.status, StoredStatus::Known(PaymentStatus::Paid));
        assert_eq!(payment.amount_krw, 100_000);
        assert_eq!(payment.provider_payment_id.as_deref(), Some("tx-1"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn test_first_signal_inserts_payment(pool: PgPool) {
        let store = PgStore::new(pool);
        let order = new_order(&store, 1, 100_000).await;

        let ReconcileResult::Applied(outcome) = store
            .apply_payment_update(
                &polled("pay-first", "PAID", 100_000).with_order_id(Some(order.id)),
            )
            .await
            .unwrap()
        else {
            panic!("expected applied");
        };
        assert!(outcome.payment_inserted);

        let payment = payment_row(&store, "pay-first").await;
        assert_eq!(payment.order_id, order.id);
        assert_eq!(payment.status, StoredStatus::Known(PaymentStatus::Paid));
    }

    /// Another transaction commits the same payment id while the insert waits
    /// on the unique index.
    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at PostgreSQL"]
    async fn test_insert_conflict_reports_stored_row(pool: PgPool) {
        let store = PgStore::new(pool.clone());
        let owner = new_order(&store, 1, 100_000).await;
        let other = new_order(&store, 2, 100_000).await;

        let mut tx = pool.begin().await.unwrap();
        sqlx::query(
            "INSERT INTO payments (payment_id, order_id, amount_krw, status) \
             VALUES ('pay-race', $1, 100000, 'created')",
        )
        .bind(owner.id)
        .execute(&mut *tx)
        .await
        .unwrap();

        let racing = tokio::spawn({
            let store = store.clone();
            let update = polled("pay-race", "PAID", 100_000).with_order_id(Some(other.id));
            async move { store.apply_payment_update(&update).await }
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.commit().await.unwrap();

        let ReconcileResult::Applied(outcome) = racing.await.unwrap().unwrap() else {
            panic!("expected applied");
        };
        assert!(!outcome.payment_inserted);
        assert_eq!(
            outcome.payment_status,
            StoredStatus::Known(PaymentStatus::Created)
        );

        let payment = payment_row(&store, "pay-race").await;
        assert_eq!(payment.order_id, owner.id);
        assert_eq!(payment.status, StoredStatus::Known(PaymentStatus::Created));
    }
}
