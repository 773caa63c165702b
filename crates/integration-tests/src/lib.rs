//! Integration tests for the Re:Space storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p respace-integration-tests
//! ```
//!
//! The full router runs in-process against `MemoryStore` and a
//! [`ScriptedGateway`] that answers payment polls from a script, so no
//! database or `PortOne` account is needed.
//!
//! # Test Categories
//!
//! - `api` - Routing, health checks, error bodies
//! - `checkout` - Order creation through payment completion
//! - `reconciliation` - Idempotence, precedence, amount gate, races
//! - `webhooks` - Signature verification and webhook-driven updates

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower::ServiceExt;

use respace_core::{OrderId, OrderStatus, PaymentStatus, StoredStatus};
use respace_storefront::config::{
    ChannelKeys, PortOneConfig, StorefrontConfig, WebhookConfig,
};
use respace_storefront::db::{
    CatalogRepository, MemoryStore, OrderRepository, PaymentRepository, Store,
};
use respace_storefront::models::{NewProduct, Order, Payment, Product};
use respace_storefront::portone::{GatewayError, PaymentGateway, PolledPayment, WebhookVerifier};
use respace_storefront::services::ReconciliationEngine;
use respace_storefront::state::AppState;

/// Webhook secret shared by the app under test and [`TestApp::signed_headers`].
pub const WEBHOOK_SECRET: &str = "whsec_YS10ZXN0LXdlYmhvb2stc2lnbmluZy1rZXktMzJieXRl";

// =============================================================================
// Scripted gateway
// =============================================================================

/// What the gateway answers for one payment id.
#[derive(Debug, Clone)]
pub enum Script {
    Payment(PolledPayment),
    /// A raw `GET /payments/{id}` body, decoded as the real client does.
    Body(Value),
    Timeout,
}

/// A [`PaymentGateway`] answering from a per-payment script.
/// Payments without a script are `Unrecognized`.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    /// Answer polls for `payment_id` with `status` and `amount_total`.
    pub async fn set(&self, payment_id: &str, status: &str, amount_total: i64) {
        self.script(payment_id, Script::Payment(polled(status, amount_total)))
            .await;
    }

    pub async fn script(&self, payment_id: &str, script: Script) {
        self.scripts
            .lock()
            .await
            .insert(payment_id.to_owned(), script);
    }

    /// Payment ids polled so far, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn get_payment(&self, payment_id: &str) -> Result<PolledPayment, GatewayError> {
        self.calls.lock().await.push(payment_id.to_owned());
        match self.scripts.lock().await.get(payment_id) {
            Some(Script::Payment(payment)) => Ok(payment.clone()),
            Some(Script::Body(raw)) => PolledPayment::from_response(raw.clone())
                .map_err(|e| GatewayError::Response(e.to_string())),
            Some(Script::Timeout) => Err(GatewayError::Timeout),
            None => Ok(PolledPayment::Unrecognized),
        }
    }
}

/// A recognized poll result.
#[must_use]
pub fn polled(status: &str, amount_total: i64) -> PolledPayment {
    PolledPayment::Recognized {
        status: status.to_owned(),
        amount_total,
        transaction_id: Some(format!("tx-{status}")),
        raw: json!({ "status": status, "amount": { "total": amount_total } }),
    }
}

// =============================================================================
// Test application
// =============================================================================

/// How much of `PortOne` the app under test has configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payments {
    /// Poll client and webhook secret.
    Full,
    /// Webhook secret only; webhooks apply their own status.
    WebhookOnly,
    /// Nothing.
    Disabled,
}

/// The storefront router wired to in-memory collaborators.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub state: AppState,
    router: Router,
    verifier: WebhookVerifier,
}

impl TestApp {
    /// App with polling and webhooks configured.
    #[must_use]
    pub fn new() -> Self {
        Self::with_payments(Payments::Full)
    }

    #[must_use]
    pub fn with_payments(payments: Payments) -> Self {
        let webhook = WebhookConfig {
            secret: SecretString::from(WEBHOOK_SECRET),
            tolerance: Duration::from_secs(300),
        };
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://unused/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".to_owned()],
            rate_limit: false,
            portone: (payments == Payments::Full).then(portone_config),
            webhook: (payments != Payments::Disabled).then(|| webhook.clone()),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let poller: Option<Arc<dyn PaymentGateway>> =
            (payments == Payments::Full).then(|| Arc::clone(&gateway) as Arc<dyn PaymentGateway>);
        let state = AppState::new(config, Arc::clone(&store) as Arc<dyn Store>, poller);

        Self {
            router: respace_storefront::app(state.clone()),
            store,
            gateway,
            state,
            verifier: WebhookVerifier::new(&webhook),
        }
    }

    /// The reconciliation engine the app uses.
    #[must_use]
    pub fn engine(&self) -> &ReconciliationEngine {
        self.state.engine()
    }

    /// Send a request and decode the JSON response. Non-JSON bodies decode
    /// as a JSON string.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, body)
    }

    /// Post a webhook body with the given headers.
    pub async fn post_webhook(
        &self,
        body: impl Into<Body>,
        headers: &HeaderMap,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/webhooks/portone")
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let (status, _, body) = self
            .send(builder.body(body.into()).unwrap())
            .await;
        (status, body)
    }

    /// Standard Webhooks headers signing `body` now.
    #[must_use]
    pub fn signed_headers(&self, body: impl AsRef<[u8]>) -> HeaderMap {
        let id = "msg_integration";
        let ts = chrono::Utc::now().timestamp().to_string();
        let mut headers = HeaderMap::new();
        headers.insert("webhook-id", HeaderValue::from_static(id));
        headers.insert("webhook-timestamp", HeaderValue::from_str(&ts).unwrap());
        headers.insert(
            "webhook-signature",
            HeaderValue::from_str(&self.verifier.signature(id, &ts, body.as_ref())).unwrap(),
        );
        headers
    }

    /// Post a correctly signed webhook.
    pub async fn deliver_webhook(&self, event_type: &str, payment_id: &str) -> (StatusCode, Value) {
        let body = webhook_body(event_type, payment_id);
        let headers = self.signed_headers(&body);
        self.post_webhook(body, &headers).await
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    pub async fn seed_product(&self, name: &str, price_krw: i64) -> Product {
        self.store
            .insert_product(&NewProduct {
                name: name.to_owned(),
                description: None,
                price_krw,
                image_url: None,
                is_active: true,
            })
            .await
            .unwrap()
    }

    /// Create an order for `quantity` of `product` through the API.
    pub async fn create_order(&self, product: &Product, quantity: i64) -> Value {
        let (status, body) = self
            .post(
                "/api/orders",
                &json!({
                    "productId": product.id.to_string(),
                    "quantity": quantity,
                    "customerName": "김리스",
                    "customerEmail": "buyer@example.com",
                    "customerPhone": "010-1234-5678",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["order"].clone()
    }

    /// Create an order and prepare a card payment for it.
    /// Returns `(order_id, payment_id)`.
    pub async fn prepared_order(&self, price_krw: i64) -> (OrderId, String) {
        let product = self.seed_product("스탠딩 데스크", price_krw).await;
        let order = self.create_order(&product, 1).await;
        let order_id = order["id"].as_str().unwrap().to_owned();

        let (status, body) = self
            .post(
                "/api/payments/portone/prepare",
                &json!({ "orderId": order_id, "payMethod": "CARD" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        (
            OrderId::parse(&order_id).unwrap(),
            body["paymentId"].as_str().unwrap().to_owned(),
        )
    }

    pub async fn complete(&self, order_id: OrderId, payment_id: &str) -> (StatusCode, Value) {
        self.post(
            "/api/payments/portone/complete",
            &json!({ "paymentId": payment_id, "orderId": order_id.to_string() }),
        )
        .await
    }

    pub async fn order(&self, order_id: OrderId) -> Order {
        self.store.find_order(order_id).await.unwrap().unwrap()
    }

    pub async fn payment(&self, payment_id: &str) -> Payment {
        self.store.find_payment(payment_id).await.unwrap().unwrap()
    }

    pub async fn order_status(&self, order_id: OrderId) -> StoredStatus<OrderStatus> {
        self.order(order_id).await.status
    }

    pub async fn payment_status(&self, payment_id: &str) -> StoredStatus<PaymentStatus> {
        self.payment(payment_id).await.status
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A `PortOne` webhook body for `event_type` about `payment_id`.
#[must_use]
pub fn webhook_body(event_type: &str, payment_id: &str) -> String {
    json!({
        "type": event_type,
        "timestamp": "2026-01-29T03:00:00Z",
        "data": { "paymentId": payment_id, "transactionId": format!("tx-{payment_id}") },
    })
    .to_string()
}

fn portone_config() -> PortOneConfig {
    PortOneConfig {
        api_secret: SecretString::from("aB3xY9mK2nL5pQ7rT0uW4zC6dE8fG1hJ"),
        store_id: "store-00000000-0000-0000-0000-000000000000".to_owned(),
        channel_keys: ChannelKeys {
            card: "channel-key-card".to_owned(),
            transfer: None,
            virtual_account: Some("channel-key-va".to_owned()),
        },
        api_base: url::Url::parse("https://api.portone.invalid").unwrap(),
        timeout: Duration::from_secs(1),
    }
}
