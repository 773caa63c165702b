//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (store ping)
//!
//! # API
//! GET  /api/health                     - {"ok": true, "time": ...}
//! GET  /api/products/active            - The product on sale
//! POST /api/orders                     - Create an order
//! POST /api/orders/lookup              - Find an order by number and email
//! POST /api/quotes                     - Bulk quote request
//! POST /api/payments/portone/prepare   - Start a payment attempt
//! POST /api/payments/portone/complete  - Reconcile a finished payment
//! POST /api/webhooks/portone           - PortOne webhook
//! ```
//!
//! Order, quote and payment routes are rate limited per client IP when
//! `STOREFRONT_RATE_LIMIT` is on. Health and webhook routes never are.

pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod quotes;
pub mod webhooks;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::{
    REQUEST_ID_HEADER, api_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create))
        .route("/lookup", post(orders::lookup))
}

/// Create the `PortOne` payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/prepare", post(payments::prepare))
        .route("/complete", post(payments::complete))
}

/// Create the rate-limited API routes.
fn limited_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .nest("/orders", order_routes())
        .route("/quotes", post(quotes::create))
        .nest("/payments/portone", payment_routes());

    if rate_limit {
        router.layer(api_rate_limiter())
    } else {
        router
    }
}

/// Create the `/api` router.
pub fn api_routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::api_health))
        .route("/products/active", get(products::active))
        .route("/webhooks/portone", post(webhooks::portone))
        .merge(limited_routes(rate_limit))
}

/// Build the complete storefront application.
///
/// Sentry layers are added by the binary; everything else a request passes
/// through is here, so tests exercise the same stack.
pub fn app(state: AppState) -> Router {
    let config = state.config();
    let cors = cors_layer(&config.cors_origins);
    let rate_limit = config.rate_limit;

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes(rate_limit))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// CORS for the storefront frontend. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            HeaderValue::from_str(origin)
                .inspect_err(|_| tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([axum::http::HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
}

async fn not_found() -> AppError {
    AppError::NotFound
}
