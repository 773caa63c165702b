//! `PortOne` REST client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::error::GatewayError;
use super::types::{ErrorResponse, PolledPayment};
use crate::config::PortOneConfig;

/// Error type `PortOne` returns for an unknown payment id.
const PAYMENT_NOT_FOUND: &str = "PAYMENT_NOT_FOUND";

/// Fetches the authoritative state of a payment.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Poll one payment by the id checkout generated.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Timeout`] when the request times out and other
    /// variants for transport or API failures. An unknown id is not an error.
    async fn get_payment(&self, payment_id: &str) -> Result<PolledPayment, GatewayError>;
}

/// `PortOne` V2 API client.
#[derive(Clone)]
pub struct PortOneClient {
    /// HTTP client.
    client: Client,
    api_secret: SecretString,
    api_base: Url,
}

impl std::fmt::Debug for PortOneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortOneClient")
            .field("api_secret", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl PortOneClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &PortOneConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_secret: config.api_secret.clone(),
            api_base: config.api_base.clone(),
        })
    }

    fn payment_url(&self, payment_id: &str) -> Result<Url, GatewayError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Request("API base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .push("payments")
            .push(payment_id);
        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for PortOneClient {
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    async fn get_payment(&self, payment_id: &str) -> Result<PolledPayment, GatewayError> {
        let url = self.payment_url(payment_id)?;

        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("PortOne {}", self.api_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("PortOne payment lookup timed out");
                    GatewayError::Timeout
                } else {
                    GatewayError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Response(e.to_string())
            }
        })?;

        if !status.is_success() {
            let err: ErrorResponse = serde_json::from_str(&body).unwrap_or_default();

            if status == StatusCode::NOT_FOUND
                || err.error_type.as_deref() == Some(PAYMENT_NOT_FOUND)
            {
                debug!("PortOne does not know this payment");
                return Ok(PolledPayment::Unrecognized);
            }

            error!(
                status = status.as_u16(),
                error_type = ?err.error_type,
                "PortOne API error fetching payment"
            );
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: err
                    .message
                    .or(err.error_type)
                    .unwrap_or_else(|| "Unknown error".to_string()),
            });
        }

        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| GatewayError::Response(e.to_string()))?;
        let payment =
            PolledPayment::from_response(raw).map_err(|e| GatewayError::Response(e.to_string()))?;

        debug!("Payment fetched from PortOne");

        Ok(payment)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ChannelKeys;

    fn client(base: &str) -> PortOneClient {
        PortOneClient::new(&PortOneConfig {
            api_secret: SecretString::from("portone-api-secret-value".to_string()),
            store_id: "store-test".to_string(),
            channel_keys: ChannelKeys {
                card: "channel-card".to_string(),
                transfer: None,
                virtual_account: None,
            },
            api_base: Url::parse(base).unwrap(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_payment_url() {
        let url = client("https://api.portone.io").payment_url("pay-1").unwrap();
        assert_eq!(url.as_str(), "https://api.portone.io/payments/pay-1");

        let url = client("https://proxy.example.com/portone/")
            .payment_url("pay-1")
            .unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/portone/payments/pay-1");
    }

    #[test]
    fn test_payment_url_escapes_id() {
        let url = client("https://api.portone.io")
            .payment_url("a/b?c")
            .unwrap();
        assert_eq!(url.as_str(), "https://api.portone.io/payments/a%2Fb%3Fc");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", client("https://api.portone.io"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("portone-api-secret-value"));
    }
}
