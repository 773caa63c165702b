//! Order route handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::Result;
use crate::services::checkout::{CreateOrderRequest, LookupRequest};
use crate::state::AppState;

/// Create a pending order.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let order = state.checkout().create_order(&request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "order": order }))))
}

/// Look an order up by order number and buyer email.
#[instrument(skip_all)]
pub async fn lookup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload?;
    let order = state.checkout().lookup_order(&request).await?;
    Ok(Json(json!({ "order": order })))
}
