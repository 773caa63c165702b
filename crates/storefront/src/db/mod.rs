//! Database operations for the storefront `PostgreSQL`.
//!
//! ## Tables
//!
//! - `products` - Catalog (read-only to checkout)
//! - `orders` - One row per checkout, prices captured at creation
//! - `order_items` - Line items of an order
//! - `payments` - One row per gateway payment attempt, keyed by `payment_id`
//! - `quotes` - Bulk quote requests
//!
//! Handlers and services only see the repository traits below, implemented
//! by [`PgStore`] and, for tests, by `MemoryStore`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p respace-cli -- migrate
//! ```

mod orders;
mod payments;
mod products;
mod quotes;

#[cfg(any(test, feature = "memory-store"))]
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use respace_core::reconcile::{PaymentUpdate, ReconcileOutcome};
use respace_core::{Email, OrderId, OrderNumber, ProductId};

use crate::models::{
    NewOrder, NewPayment, NewProduct, NewQuote, Order, OrderLine, Payment, Product, QuoteCreated,
};

#[cfg(any(test, feature = "memory-store"))]
pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Result of running a payment update against the locked rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileResult {
    /// Writes committed.
    Applied(ReconcileOutcome),
    /// Amounts disagreed. Any payment row flag was committed; the order was not touched.
    AmountMismatch { expected: i64, observed: i64 },
    /// Neither the update nor an existing payment row names an existing order.
    OrderNotFound,
}

/// Catalog reads.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// The oldest active product.
    async fn active_product(&self) -> Result<Option<Product>, RepositoryError>;

    /// Products with the given ids, active or not, in no particular order.
    async fn products_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a catalog product.
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;
}

/// Orders and their line items.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order and its lines atomically.
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RepositoryError>;

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Find an order by number and (case-insensitive) customer email.
    async fn find_order_by_number(
        &self,
        number: &OrderNumber,
        email: &Email,
    ) -> Result<Option<Order>, RepositoryError>;

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError>;
}

/// Payment attempts and reconciliation.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a payment attempt with status `created`.
    ///
    /// Returns `RepositoryError::Conflict` if the payment id exists.
    async fn insert_payment(&self, payment: &NewPayment) -> Result<Payment, RepositoryError>;

    async fn find_payment(&self, payment_id: &str) -> Result<Option<Payment>, RepositoryError>;

    /// Payment attempts of an order, oldest first.
    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, RepositoryError>;

    /// Run [`respace_core::reconcile::plan`] for `update` while holding locks
    /// on the order and payment rows, and perform its writes atomically.
    async fn apply_payment_update(
        &self,
        update: &PaymentUpdate,
    ) -> Result<ReconcileResult, RepositoryError>;
}

/// Quote requests.
#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn insert_quote(&self, quote: &NewQuote) -> Result<QuoteCreated, RepositoryError>;
}

/// Everything the storefront needs from storage.
#[async_trait]
pub trait Store: CatalogRepository + OrderRepository + PaymentRepository + QuoteRepository {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a unique violation to `RepositoryError::Conflict`.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
