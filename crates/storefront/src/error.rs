//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error renders as `{"error": CODE, "message": text, "details"?: {...}}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::portone::{GatewayError, WebhookError};
use crate::services::{
    CheckoutError, NotificationError, QuoteError, ReconcileError, ValidationErrors,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request failed validation.
    #[error("Invalid input: {0}")]
    Validation(ValidationErrors),

    /// A collaborator this request needs is not configured.
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Product not found")]
    ProductNotFound,

    /// The gateway collected a different amount than the order total.
    #[error("Amount mismatch: expected {expected}, observed {observed}")]
    AmountMismatch { expected: i64, observed: i64 },

    #[error("Payment not recognized by gateway")]
    UnrecognizedPayment,

    /// Webhook authentication failed.
    #[error("Invalid notification: {0}")]
    InvalidNotification(#[from] WebhookError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment gateway call failed.
    #[error("Gateway error: {0}")]
    Upstream(GatewayError),

    #[error("Gateway timed out")]
    UpstreamTimeout,

    /// Unknown route.
    #[error("Not found")]
    NotFound,

    #[error("Request body too large")]
    PayloadTooLarge,

    /// A completion failure. Keeps the inner code but not its message.
    #[error("Payment failed: {0}")]
    PaymentFailed(Box<AppError>),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a ValidationErrors>,
}

impl AppError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_INPUT",
            Self::NotReady(_) => "SERVER_NOT_READY",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::ProductNotFound => "PRODUCT_NOT_FOUND",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::UnrecognizedPayment => "UNRECOGNIZED_PAYMENT",
            Self::InvalidNotification(_) => "INVALID_NOTIFICATION",
            Self::Database(_) => "DB_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::NotFound => "NOT_FOUND",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::PaymentFailed(inner) => inner.code(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::OrderNotFound
            | Self::ProductNotFound
            | Self::UnrecognizedPayment
            | Self::NotFound => StatusCode::NOT_FOUND,
            Self::AmountMismatch { .. } => StatusCode::CONFLICT,
            Self::InvalidNotification(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::PaymentFailed(inner) => inner.status(),
        }
    }

    /// Whether the failure is ours or a collaborator's rather than the caller's.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Upstream(_) | Self::UpstreamTimeout => true,
            Self::PaymentFailed(inner) => inner.is_server_error(),
            _ => false,
        }
    }

    /// Wrap a failure from the synchronous completion path.
    #[must_use]
    pub fn payment_failed(self) -> Self {
        match self {
            Self::Validation(_) | Self::PaymentFailed(_) => self,
            other => Self::PaymentFailed(Box::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::Upstream(_) | Self::UpstreamTimeout => "Payment gateway error".to_string(),
            Self::InvalidNotification(_) => "Invalid notification".to_string(),
            Self::PaymentFailed(_) => "payment processing failed".to_string(),
            Self::Validation(_) => "Invalid input".to_string(),
            other => other.to_string(),
        };

        let details = match &self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        };

        let body = ErrorBody {
            error: self.code(),
            message: &message,
            details,
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge;
        }
        Self::Validation(ValidationErrors::form(rejection.body_text()))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => Self::UpstreamTimeout,
            other => Self::Upstream(other),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::OrderNotFound => Self::OrderNotFound,
            ReconcileError::AmountMismatch { expected, observed } => {
                Self::AmountMismatch { expected, observed }
            }
            ReconcileError::UnrecognizedPayment => Self::UnrecognizedPayment,
            ReconcileError::NotReady => Self::NotReady("payment gateway".to_string()),
            ReconcileError::GatewayTimeout => Self::UpstreamTimeout,
            ReconcileError::Gateway(e) => Self::Upstream(e),
            ReconcileError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(errors) => Self::Validation(errors),
            CheckoutError::ProductNotFound => Self::ProductNotFound,
            CheckoutError::OrderNotFound => Self::OrderNotFound,
            CheckoutError::NotReady => Self::NotReady("payments".to_string()),
            CheckoutError::Reconcile(e) => e.into(),
            CheckoutError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<QuoteError> for AppError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::Validation(errors) => Self::Validation(errors),
            QuoteError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotReady => Self::NotReady("webhook verification".to_string()),
            NotificationError::Invalid(e) => Self::InvalidNotification(e),
            NotificationError::Reconcile(e) => e.into(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a payment step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of steps
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
