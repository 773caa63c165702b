//! Inbound `PortOne` webhooks.

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use respace_core::reconcile::{PaymentUpdate, ReconcileOutcome, normalize_webhook};

use super::reconciliation::{ReconcileError, ReconciliationEngine};
use crate::portone::{WebhookError, WebhookEvent, WebhookVerifier};

/// Errors that can occur while handling a webhook.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No webhook secret is configured.
    #[error("webhook verification not configured")]
    NotReady,

    /// Signature or headers failed verification.
    #[error("invalid notification: {0}")]
    Invalid(#[from] WebhookError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// What a webhook led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Acknowledged without touching the store.
    Ignored,
    Reconciled(ReconcileOutcome),
}

/// Webhook service.
pub struct WebhookService<'a> {
    verifier: Option<&'a WebhookVerifier>,
    engine: &'a ReconciliationEngine,
}

impl<'a> WebhookService<'a> {
    #[must_use]
    pub fn new(verifier: Option<&'a WebhookVerifier>, engine: &'a ReconciliationEngine) -> Self {
        Self { verifier, engine }
    }

    /// Verify a webhook and reconcile the payment it names.
    ///
    /// With a gateway configured the payment is re-polled, so the webhook body
    /// is only trusted for the payment id. Without one, the event type's own
    /// status pair is applied with no amount.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::NotReady` without a verifier,
    /// `NotificationError::Invalid` before any store access if verification
    /// fails, and `NotificationError::Reconcile` for reconciliation failures.
    #[instrument(skip_all, fields(payment_id))]
    pub async fn receive_webhook(
        &self,
        body: &[u8],
        headers: &HeaderMap,
    ) -> Result<WebhookOutcome, NotificationError> {
        let verifier = self.verifier.ok_or(NotificationError::NotReady)?;

        let event = verifier.verify(body, headers).inspect_err(|e| {
            warn!(error = %e, "Rejected PortOne webhook");
        })?;

        let WebhookEvent::Recognized {
            event_type,
            payment_id,
            transaction_id,
            raw,
        } = event
        else {
            debug!("Ignoring unrecognized webhook body");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(payment_id) = payment_id else {
            debug!(event_type = %event_type, "Ignoring webhook without payment id");
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(pair) = normalize_webhook(&event_type) else {
            debug!(event_type = %event_type, "Ignoring webhook event type");
            return Ok(WebhookOutcome::Ignored);
        };

        tracing::Span::current().record("payment_id", payment_id.as_str());

        let outcome = if self.engine.has_gateway() {
            self.engine
                .sync_payment_from_portone(&payment_id, None)
                .await?
        } else {
            let update = PaymentUpdate::new(payment_id)
                .with_status(pair)
                .with_provider_payment_id(transaction_id)
                .with_raw_payload(raw);
            self.engine.apply_payment_update(&update).await?
        };

        Ok(WebhookOutcome::Reconciled(outcome))
    }
}
