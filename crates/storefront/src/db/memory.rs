//! In-memory [`Store`] for tests.
//!
//! One mutex guards every table, and reconciliation holds it across the whole
//! decision, which gives the same atomicity the row locks give in `PostgreSQL`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use respace_core::reconcile::{
    OrderSnapshot, PaymentSnapshot, PaymentUpdate, PaymentWrite, ReconcilePlan, plan,
    resolve_order_id,
};
use respace_core::{
    CurrencyCode, Email, OrderId, OrderNumber, OrderStatus, PaymentStatus, ProductId, QuoteId,
    StoredStatus,
};

use super::{
    CatalogRepository, OrderRepository, PaymentRepository, QuoteRepository, ReconcileResult,
    RepositoryError, Store,
};
use crate::models::payment::PROVIDER_PORTONE;
use crate::models::quote::QUOTE_STATUS_NEW;
use crate::models::{
    NewOrder, NewPayment, NewProduct, NewQuote, Order, OrderLine, Payment, Product, QuoteCreated,
};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    orders: HashMap<OrderId, Order>,
    lines: HashMap<OrderId, Vec<OrderLine>>,
    payments: HashMap<String, Payment>,
    quotes: Vec<(NewQuote, QuoteCreated)>,
}

/// A [`Store`] backed by hash maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a database error, or recover.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// Overwrite an order's stored status, bypassing reconciliation.
    pub async fn set_order_status(&self, order_id: OrderId, status: StoredStatus<OrderStatus>) {
        if let Some(order) = self.tables.lock().await.orders.get_mut(&order_id) {
            order.status = status;
        }
    }

    /// Number of stored payment rows.
    pub async fn payment_count(&self) -> usize {
        self.tables.lock().await.payments.len()
    }

    /// Stored quote requests, oldest first.
    pub async fn quotes(&self) -> Vec<NewQuote> {
        self.tables
            .lock()
            .await
            .quotes
            .iter()
            .map(|(quote, _)| quote.clone())
            .collect()
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn active_product(&self) -> Result<Option<Product>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.is_active)
            .min_by_key(|p| p.created_at)
            .cloned())
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        self.check_available()?;
        let row = Product {
            id: ProductId::generate(),
            name: product.name.clone(),
            description: product.description.clone(),
            price_krw: product.price_krw,
            image_url: product.image_url.clone(),
            is_active: product.is_active,
            created_at: Utc::now(),
        };
        self.tables.lock().await.products.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        if tables
            .orders
            .values()
            .any(|o| o.order_number == order.order_number.as_str())
        {
            return Err(RepositoryError::Conflict(
                "order number already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let row = Order {
            id: OrderId::generate(),
            order_number: order.order_number.as_str().to_owned(),
            status: OrderStatus::Pending.into(),
            total_price_krw: order.total.as_i64(),
            currency: CurrencyCode::KRW.as_str().to_owned(),
            customer_name: order.customer.name.clone(),
            customer_email: order.customer.email.as_str().to_owned(),
            customer_phone: order.customer.phone.clone(),
            user_id: order.user_id,
            guest_token: order.guest_token,
            is_cart: order.is_cart,
            created_at: now,
            updated_at: now,
        };

        let lines = order
            .lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                image_url: tables
                    .products
                    .iter()
                    .find(|p| p.id == line.product_id)
                    .and_then(|p| p.image_url.clone()),
                quantity: line.quantity,
                unit_price_krw: line.unit_price.as_i64(),
                line_total_krw: line.line_total.as_i64(),
            })
            .collect();

        tables.lines.insert(row.id, lines);
        tables.orders.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn find_order_by_number(
        &self,
        number: &OrderNumber,
        email: &Email,
    ) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .values()
            .find(|o| {
                o.order_number == number.as_str()
                    && o.customer_email.to_lowercase() == email.as_str()
            })
            .cloned())
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .await
            .lines
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        if tables.payments.contains_key(&payment.payment_id) {
            return Err(RepositoryError::Conflict(
                "payment id already exists".to_owned(),
            ));
        }

        let now = Utc::now();
        let row = Payment {
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id,
            provider: PROVIDER_PORTONE.to_owned(),
            provider_payment_id: None,
            pay_method: Some(payment.pay_method.as_str().to_owned()),
            amount_krw: payment.amount.as_i64(),
            currency: CurrencyCode::KRW.as_str().to_owned(),
            status: PaymentStatus::Created.into(),
            raw_payload: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(row.payment_id.clone(), row.clone());
        Ok(row)
    }

    async fn find_payment(&self, payment_id: &str) -> Result<Option<Payment>, RepositoryError> {
        self.check_available()?;
        Ok(self.tables.lock().await.payments.get(payment_id).cloned())
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError> {
        self.check_available()?;
        let tables = self.tables.lock().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn apply_payment_update(
        &self,
        update: &PaymentUpdate,
    ) -> Result<ReconcileResult, RepositoryError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;

        let payment = tables
            .payments
            .get(&update.payment_id)
            .map(|p| PaymentSnapshot {
                order_id: p.order_id,
                amount_krw: p.amount_krw,
                status: p.status.clone(),
            });
        let Some(order_id) = resolve_order_id(update, payment.as_ref()) else {
            return Ok(ReconcileResult::OrderNotFound);
        };
        let Some(order) = tables.orders.get(&order_id).map(|o| OrderSnapshot {
            order_id: o.id,
            total_krw: o.total_price_krw,
            status: o.status.clone(),
        }) else {
            return Ok(ReconcileResult::OrderNotFound);
        };

        match plan(&order, payment.as_ref(), update) {
            ReconcilePlan::AmountMismatch {
                expected,
                observed,
                payment,
            } => {
                if let Some(write) = payment {
                    write_payment(&mut tables, order_id, update, write);
                }
                Ok(ReconcileResult::AmountMismatch { expected, observed })
            }
            ReconcilePlan::Apply {
                order: order_write,
                payment,
                outcome,
            } => {
                if let Some(status) = order_write
                    && let Some(row) = tables.orders.get_mut(&order_id)
                {
                    row.status = status.into();
                    row.updated_at = Utc::now();
                }
                write_payment(&mut tables, order_id, update, payment);
                Ok(ReconcileResult::Applied(outcome))
            }
        }
    }
}

fn write_payment(tables: &mut Tables, order_id: OrderId, update: &PaymentUpdate, write: PaymentWrite) {
    let now = Utc::now();
    match write {
        PaymentWrite::Insert { status, amount_krw } => {
            tables.payments.insert(
                update.payment_id.clone(),
                Payment {
                    payment_id: update.payment_id.clone(),
                    order_id,
                    provider: PROVIDER_PORTONE.to_owned(),
                    provider_payment_id: update.provider_payment_id.clone(),
                    pay_method: None,
                    amount_krw,
                    currency: CurrencyCode::KRW.as_str().to_owned(),
                    status: status.into(),
                    raw_payload: update.raw_payload.clone(),
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        PaymentWrite::Update { status, amount_krw } => {
            if let Some(row) = tables.payments.get_mut(&update.payment_id) {
                if let Some(status) = status {
                    row.status = status.into();
                }
                if let Some(amount) = amount_krw {
                    row.amount_krw = amount;
                }
                if let Some(id) = &update.provider_payment_id {
                    row.provider_payment_id = Some(id.clone());
                }
                row.raw_payload = update.raw_payload.clone();
                row.updated_at = now;
            }
        }
    }
}

#[async_trait]
impl QuoteRepository for MemoryStore {
    async fn insert_quote(&self, quote: &NewQuote) -> Result<QuoteCreated, RepositoryError> {
        self.check_available()?;
        let created = QuoteCreated {
            id: QuoteId::generate(),
            status: QUOTE_STATUS_NEW.to_owned(),
            created_at: Utc::now(),
        };
        self.tables
            .lock()
            .await
            .quotes
            .push((quote.clone(), created.clone()));
        Ok(created)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}
