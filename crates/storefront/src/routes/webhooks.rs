//! `PortOne` webhook handler.
//!
//! A non-2xx response makes `PortOne` retry, so only verification failures
//! and reconciliation errors are reported as errors. Events we don't act on
//! are acknowledged.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::state::AppState;

/// Receive a `PortOne` webhook. The signature covers the raw bytes, so the
/// body is not decoded before verification.
#[instrument(skip_all)]
pub async fn portone(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let outcome = state.webhooks().receive_webhook(&body, &headers).await?;
    debug!(?outcome, "Webhook handled");

    Ok(Json(json!({ "ok": true })))
}
