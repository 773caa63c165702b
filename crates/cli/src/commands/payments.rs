//! Payment operations.
//!
//! `sync` runs the same poll-and-reconcile path as the completion endpoint.
//! Use it when a webhook was missed or the buyer closed the browser before
//! completion.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `PORTONE_API_SECRET`, `PORTONE_STORE_ID`, `PORTONE_CHANNEL_KEY_CARD` - see storefront config

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use respace_storefront::config::{ConfigError, StorefrontConfig};
use respace_storefront::db::{self, PgStore, Store};
use respace_storefront::portone::{GatewayError, PaymentGateway, PortOneClient};
use respace_storefront::services::{ReconcileError, ReconciliationEngine};

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentCommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("PortOne is not configured (set PORTONE_API_SECRET, PORTONE_STORE_ID, PORTONE_CHANNEL_KEY_CARD)")]
    NotConfigured,

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Re-poll `PortOne` for `payment_id` and reconcile its order.
///
/// # Errors
///
/// Returns an error if configuration is missing, the gateway call fails, or
/// reconciliation rejects the payment.
pub async fn sync(payment_id: &str) -> Result<(), PaymentCommandError> {
    let config = StorefrontConfig::from_env()?;
    let portone = config
        .portone
        .as_ref()
        .ok_or(PaymentCommandError::NotConfigured)?;

    let gateway: Arc<dyn PaymentGateway> = Arc::new(PortOneClient::new(portone)?);
    let pool = db::create_pool(&config.database_url).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let engine = ReconciliationEngine::new(store, Some(gateway));
    let outcome = engine.sync_payment_from_portone(payment_id, None).await?;

    info!(
        payment_id,
        order_id = %outcome.order_id,
        order_status = %outcome.order_status,
        payment_status = %outcome.payment_status,
        order_changed = outcome.order_changed,
        "Payment synced"
    );

    Ok(())
}
