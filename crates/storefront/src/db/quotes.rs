//! Quote queries.

use async_trait::async_trait;

use super::{PgStore, QuoteRepository, RepositoryError};
use crate::models::quote::QUOTE_STATUS_NEW;
use crate::models::{NewQuote, QuoteCreated};

#[async_trait]
impl QuoteRepository for PgStore {
    async fn insert_quote(&self, quote: &NewQuote) -> Result<QuoteCreated, RepositoryError> {
        let row = sqlx::query_as::<_, QuoteCreated>(
            "INSERT INTO quotes (customer_name, customer_email, customer_phone, quantity, \
                 message, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, status, created_at",
        )
        .bind(&quote.customer_name)
        .bind(quote.customer_email.as_str())
        .bind(&quote.customer_phone)
        .bind(quote.quantity)
        .bind(&quote.message)
        .bind(QUOTE_STATUS_NEW)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
