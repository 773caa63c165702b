//! Webhook signature verification.
//!
//! `PortOne` V2 signs webhooks with the Standard Webhooks scheme:
//! <https://www.standardwebhooks.com/>
//!
//! The signed content is `{webhook-id}.{webhook-timestamp}.{body}`, the MAC is
//! HMAC-SHA256 under the decoded secret, and `webhook-signature` carries one or
//! more space-separated `v1,<base64>` entries.

use std::time::Duration;

use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use tracing::{debug, instrument};

use super::error::WebhookError;
use super::types::WebhookEvent;
use crate::config::WebhookConfig;

const HEADER_ID: &str = "webhook-id";
const HEADER_TIMESTAMP: &str = "webhook-timestamp";
const HEADER_SIGNATURE: &str = "webhook-signature";

const SECRET_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// Verifies inbound `PortOne` webhooks.
pub struct WebhookVerifier {
    key: SecretSlice<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("key", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    /// Build a verifier from the configured secret.
    ///
    /// A `whsec_` prefix is stripped and the rest base64-decoded; a secret that
    /// is not base64 is used as raw bytes.
    #[must_use]
    pub fn new(config: &WebhookConfig) -> Self {
        let secret = config.secret.expose_secret();
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .unwrap_or_else(|_| encoded.as_bytes().to_vec());

        Self {
            key: SecretSlice::from(key),
            tolerance: config.tolerance,
        }
    }

    /// Verify headers and signature against the current time, then decode the body.
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookError`] if any header is missing or malformed, the
    /// timestamp is outside tolerance, or no signature matches.
    pub fn verify(&self, body: &[u8], headers: &HeaderMap) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(body, headers, chrono::Utc::now().timestamp())
    }

    /// [`verify`](Self::verify) with an explicit clock, in unix seconds.
    ///
    /// # Errors
    ///
    /// See [`verify`](Self::verify).
    #[instrument(skip(self, body, headers))]
    pub fn verify_at(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        now: i64,
    ) -> Result<WebhookEvent, WebhookError> {
        let id = header(headers, HEADER_ID)?;
        let timestamp = header(headers, HEADER_TIMESTAMP)?;
        let signatures = header(headers, HEADER_SIGNATURE)?;

        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;
        if now.abs_diff(ts) > self.tolerance.as_secs() {
            return Err(WebhookError::Stale);
        }

        let expected = self.sign(id, timestamp, body);
        let matched = signatures
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .any(|(_, sig)| constant_time_compare(&expected, sig));

        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        debug!(webhook_id = %id, "PortOne webhook signature verified");

        Ok(WebhookEvent::parse(body))
    }

    /// The `webhook-signature` entry for a message, e.g. `v1,<base64>`.
    #[must_use]
    pub fn signature(&self, id: &str, timestamp: &str, body: &[u8]) -> String {
        format!("{SIGNATURE_VERSION},{}", self.sign(id, timestamp, body))
    }

    fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> String {
        // HMAC accepts keys of any length.
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(self.key.expose_secret())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingHeader(name))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
