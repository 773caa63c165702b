//! Product route handlers.

use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;

/// The product currently on sale.
#[instrument(skip(state))]
pub async fn active(State(state): State<AppState>) -> Result<Json<Value>> {
    let product = state.checkout().active_product().await?;
    Ok(Json(json!({ "product": product })))
}
