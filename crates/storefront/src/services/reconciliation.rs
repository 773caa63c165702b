//! Payment reconciliation.
//!
//! Both completion paths (the buyer's browser and the gateway webhook) end
//! here with the same payment id. The store runs the decision under row locks,
//! so any interleaving of duplicate or out-of-order signals converges to the
//! same rows.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use respace_core::OrderId;
use respace_core::reconcile::{PaymentUpdate, ReconcileOutcome, normalize_polled};

use crate::db::{ReconcileResult, RepositoryError, Store};
use crate::portone::{GatewayError, PaymentGateway, PolledPayment};

/// Errors that can occur while reconciling a payment.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Neither the update nor the payment row leads to an existing order.
    #[error("order not found")]
    OrderNotFound,

    /// The gateway collected a different amount than the order total.
    #[error("amount mismatch: expected {expected}, observed {observed}")]
    AmountMismatch { expected: i64, observed: i64 },

    /// The gateway does not know the payment id.
    #[error("payment not recognized by gateway")]
    UnrecognizedPayment,

    /// No gateway client is configured.
    #[error("payment gateway not configured")]
    NotReady,

    /// The gateway did not answer in time. Safe to retry.
    #[error("payment gateway timed out")]
    GatewayTimeout,

    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<GatewayError> for ReconcileError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => Self::GatewayTimeout,
            other => Self::Gateway(other),
        }
    }
}

/// Applies payment updates to the store, polling the gateway when asked.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn Store>,
    gateway: Option<Arc<dyn PaymentGateway>>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("gateway", &self.gateway.is_some())
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, gateway: Option<Arc<dyn PaymentGateway>>) -> Self {
        Self { store, gateway }
    }

    /// Whether a gateway client is configured.
    #[must_use]
    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    /// Apply one normalized update atomically.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::OrderNotFound` if no order can be resolved and
    /// `ReconcileError::AmountMismatch` if the observed amount differs from the
    /// order total. On a mismatch an existing payment row has already been
    /// flagged when this returns.
    #[instrument(
        skip(self, update),
        fields(payment_id = %update.payment_id, order_id = ?update.order_id)
    )]
    pub async fn apply_payment_update(
        &self,
        update: &PaymentUpdate,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match self.store.apply_payment_update(update).await? {
            ReconcileResult::Applied(outcome) => {
                info!(
                    order_id = %outcome.order_id,
                    order_status = %outcome.order_status,
                    payment_status = %outcome.payment_status,
                    order_changed = outcome.order_changed,
                    payment_inserted = outcome.payment_inserted,
                    "Payment reconciled"
                );
                Ok(outcome)
            }
            ReconcileResult::AmountMismatch { expected, observed } => {
                warn!(expected, observed, "Payment amount does not match order total");
                Err(ReconcileError::AmountMismatch { expected, observed })
            }
            ReconcileResult::OrderNotFound => Err(ReconcileError::OrderNotFound),
        }
    }

    /// Poll `PortOne` for a payment and apply what it reports.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::NotReady` without a gateway,
    /// `ReconcileError::UnrecognizedPayment` if `PortOne` does not know the id,
    /// and anything [`apply_payment_update`](Self::apply_payment_update) returns.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn sync_payment_from_portone(
        &self,
        payment_id: &str,
        order_id: Option<OrderId>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let gateway = self.gateway.as_ref().ok_or(ReconcileError::NotReady)?;

        let PolledPayment::Recognized {
            status,
            amount_total,
            transaction_id,
            raw,
        } = gateway.get_payment(payment_id).await?
        else {
            warn!("Gateway does not recognize payment");
            return Err(ReconcileError::UnrecognizedPayment);
        };

        let update = PaymentUpdate::new(payment_id)
            .with_order_id(order_id)
            .with_status(normalize_polled(&status))
            .with_observed_amount(Some(amount_total))
            .with_provider_payment_id(transaction_id)
            .with_raw_payload(raw);

        self.apply_payment_update(&update).await
    }
}
