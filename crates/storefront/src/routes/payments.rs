//! `PortOne` payment route handlers.
//!
//! The browser calls `prepare` before opening the payment window and
//! `complete` once the window reports success. Neither trusts the browser:
//! `complete` re-polls the gateway before anything changes.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::services::checkout::{CompleteRequest, PrepareRequest, PreparedPayment};
use crate::state::AppState;

/// Create a payment attempt and return the browser SDK request.
#[instrument(skip_all)]
pub async fn prepare(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PrepareRequest>, JsonRejection>,
) -> Result<Json<PreparedPayment>> {
    let Json(request) = payload?;

    add_breadcrumb(
        "payment",
        "Preparing payment",
        Some(&[
            ("order_id", request.order_id.as_deref().unwrap_or_default()),
            ("pay_method", request.pay_method.as_deref().unwrap_or_default()),
        ]),
    );

    let prepared = state.checkout().prepare_checkout(&request).await?;
    Ok(Json(prepared))
}

/// Reconcile a payment the browser reports as finished.
///
/// Every failure after input validation keeps its error code but carries the
/// generic "payment processing failed" message.
#[instrument(skip_all)]
pub async fn complete(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;

    add_breadcrumb(
        "payment",
        "Completing payment",
        Some(&[
            ("order_id", request.order_id.as_deref().unwrap_or_default()),
            ("payment_id", request.payment_id.as_deref().unwrap_or_default()),
        ]),
    );

    let outcome = state
        .checkout()
        .complete_checkout(&request)
        .await
        .map_err(|e| AppError::from(e).payment_failed())?;

    Ok(Json(json!({ "ok": true, "order": outcome })))
}
