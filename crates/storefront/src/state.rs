//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::portone::{PaymentGateway, WebhookVerifier};
use crate::services::{CheckoutService, QuoteService, ReconciliationEngine, WebhookService};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    engine: ReconciliationEngine,
    verifier: Option<WebhookVerifier>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Order, payment, catalog and quote storage
    /// * `gateway` - `PortOne` poll client, `None` when payments are not configured
    ///
    /// The webhook verifier is built from `config.webhook`.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn Store>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let verifier = config.webhook.as_ref().map(WebhookVerifier::new);
        let engine = ReconciliationEngine::new(Arc::clone(&store), gateway);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                engine,
                verifier,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the reconciliation engine.
    #[must_use]
    pub fn engine(&self) -> &ReconciliationEngine {
        &self.inner.engine
    }

    /// Checkout service for one request.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.store(),
            self.inner.config.portone.as_ref(),
            &self.inner.engine,
        )
    }

    /// Quote service for one request.
    #[must_use]
    pub fn quotes(&self) -> QuoteService<'_> {
        QuoteService::new(self.store())
    }

    /// Webhook service for one request.
    #[must_use]
    pub fn webhooks(&self) -> WebhookService<'_> {
        WebhookService::new(self.inner.verifier.as_ref(), &self.inner.engine)
    }
}
