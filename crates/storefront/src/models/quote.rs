//! Bulk quote requests.

use chrono::{DateTime, Utc};
use serde::Serialize;

use respace_core::{Email, QuoteId};

/// Status given to every new quote.
pub const QUOTE_STATUS_NEW: &str = "new";

/// A validated quote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuote {
    pub customer_name: String,
    pub customer_email: Email,
    pub customer_phone: Option<String>,
    pub quantity: i32,
    pub message: Option<String>,
}

/// Response body for a stored quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QuoteCreated {
    pub id: QuoteId,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
