//! Bulk quote requests.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument};

use respace_core::Email;

use super::validation::{self, REQUIRED, ValidationErrors};
use crate::db::{RepositoryError, Store};
use crate::models::{NewQuote, QuoteCreated};

const MAX_NAME_LEN: usize = 80;
const MAX_PHONE_LEN: usize = 30;
const MAX_MESSAGE_LEN: usize = 2000;
const MAX_QUANTITY: i64 = 999;

/// Errors that can occur while storing a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// `POST /api/quotes` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub quantity: Option<i64>,
    pub message: Option<String>,
}

impl QuoteRequest {
    fn validate(&self) -> Result<NewQuote, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = validation::required_text(&mut errors, "name", self.name.as_deref(), MAX_NAME_LEN);
        let email = match self.email.as_deref().filter(|v| !v.trim().is_empty()) {
            Some(v) => Email::parse(v)
                .map_err(|_| errors.add("email", "Invalid email"))
                .ok(),
            None => {
                errors.add("email", REQUIRED);
                None
            }
        };
        let phone =
            validation::optional_text(&mut errors, "phone", self.phone.as_deref(), MAX_PHONE_LEN);
        let quantity = validation::quantity(&mut errors, "quantity", self.quantity, MAX_QUANTITY);
        let message = validation::optional_text(
            &mut errors,
            "message",
            self.message.as_deref(),
            MAX_MESSAGE_LEN,
        );

        match (name, email, quantity) {
            (Some(customer_name), Some(customer_email), Some(quantity)) if errors.is_empty() => {
                Ok(NewQuote {
                    customer_name,
                    customer_email,
                    customer_phone: phone,
                    quantity,
                    message,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Quote service.
pub struct QuoteService<'a> {
    store: &'a dyn Store,
}

impl<'a> QuoteService<'a> {
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Validate and store a quote request with status `new`.
    ///
    /// # Errors
    ///
    /// Returns `QuoteError::Validation` for bad input.
    #[instrument(skip(self, request))]
    pub async fn create_quote(&self, request: &QuoteRequest) -> Result<QuoteCreated, QuoteError> {
        let quote = request.validate().map_err(QuoteError::Validation)?;
        let created = self.store.insert_quote(&quote).await?;

        info!(quote_id = %created.id, quantity = quote.quantity, "Quote request stored");

        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_quote() {
        let quote = QuoteRequest {
            name: Some("Lee".to_owned()),
            email: Some("lee@example.com".to_owned()),
            phone: Some(String::new()),
            message: Some(String::new()),
            ..QuoteRequest::default()
        }
        .validate()
        .unwrap();
        assert_eq!(quote.quantity, 1);
        assert_eq!(quote.customer_phone, None);
        assert_eq!(quote.message, None);
    }

    #[test]
    fn test_quote_limits() {
        let errors = QuoteRequest {
            name: Some("x".repeat(81)),
            email: Some("not-an-email".to_owned()),
            quantity: Some(0),
            message: Some("m".repeat(2001)),
            ..QuoteRequest::default()
        }
        .validate()
        .unwrap_err();
        for field in ["name", "email", "quantity", "message"] {
            assert!(errors.field_errors.contains_key(field), "{field}");
        }
    }
}
