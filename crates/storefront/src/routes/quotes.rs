//! Quote route handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::Result;
use crate::services::quotes::QuoteRequest;
use crate::state::AppState;

/// Store a bulk quote request.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let quote = state.quotes().create_quote(&request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "quote": quote }))))
}
