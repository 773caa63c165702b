//! `PortOne` errors.

use thiserror::Error;

/// Errors that can occur when polling `PortOne`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request did not complete within the configured timeout.
    #[error("PortOne request timed out")]
    Timeout,

    /// HTTP request failed.
    #[error("PortOne request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("PortOne response error: {0}")]
    Response(String),

    /// `PortOne` returned an error status.
    #[error("PortOne API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Reasons an inbound webhook is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("invalid webhook timestamp")]
    InvalidTimestamp,

    /// Timestamp outside the tolerance window.
    #[error("webhook timestamp outside tolerance")]
    Stale,

    #[error("webhook signature mismatch")]
    InvalidSignature,
}
