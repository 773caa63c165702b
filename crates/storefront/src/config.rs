//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 8787)
//! - `STOREFRONT_RATE_LIMIT` - Enable per-IP rate limiting (default: true)
//! - `CORS_ORIGIN` - Comma-separated allowed origins
//!   (default: `http://localhost:5173,http://localhost:4173`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! ## `PortOne` (all of the first three, or none)
//! - `PORTONE_API_SECRET` - V2 API secret
//! - `PORTONE_STORE_ID` - Store ID passed to the browser SDK
//! - `PORTONE_CHANNEL_KEY_CARD` - Channel key for card payments
//! - `PORTONE_CHANNEL_KEY_TRANSFER` - Channel key for bank transfer (default: card key)
//! - `PORTONE_CHANNEL_KEY_VIRTUAL_ACCOUNT` - Channel key for virtual accounts (default: card key)
//! - `PORTONE_API_BASE` - API base URL (default: <https://api.portone.io>)
//! - `PORTONE_TIMEOUT_SECS` - Request timeout for payment lookups (default: 10)
//!
//! ## Webhooks
//! - `PORTONE_WEBHOOK_SECRET` - Webhook signing secret (`whsec_...`)
//! - `PORTONE_WEBHOOK_TOLERANCE_SECS` - Allowed clock skew (default: 300)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use respace_core::PayMethod;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:4173";
const DEFAULT_PORTONE_API_BASE: &str = "https://api.portone.io";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Whether order and quote endpoints are rate limited
    pub rate_limit: bool,
    /// `PortOne` API configuration; `None` disables payments
    pub portone: Option<PortOneConfig>,
    /// Webhook verification; `None` disables the webhook endpoint
    pub webhook: Option<WebhookConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. `production`)
    pub sentry_environment: Option<String>,
}

/// `PortOne` V2 API configuration.
///
/// Implements `Debug` manually to redact the API secret.
#[derive(Clone)]
pub struct PortOneConfig {
    /// V2 API secret
    pub api_secret: SecretString,
    /// Store ID (public, sent to the browser)
    pub store_id: String,
    /// Channel keys per payment method
    pub channel_keys: ChannelKeys,
    /// API base URL
    pub api_base: Url,
    /// Timeout for a single payment lookup
    pub timeout: Duration,
}

impl std::fmt::Debug for PortOneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortOneConfig")
            .field("api_secret", &"[REDACTED]")
            .field("store_id", &self.store_id)
            .field("channel_keys", &self.channel_keys)
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `PortOne` channel keys. Methods without their own key use the card key.
#[derive(Debug, Clone)]
pub struct ChannelKeys {
    pub card: String,
    pub transfer: Option<String>,
    pub virtual_account: Option<String>,
}

impl ChannelKeys {
    /// Channel key to use for `method`.
    #[must_use]
    pub fn for_method(&self, method: PayMethod) -> &str {
        match method {
            PayMethod::Card => &self.card,
            PayMethod::Transfer => self.transfer.as_deref().unwrap_or(&self.card),
            PayMethod::VirtualAccount => self.virtual_account.as_deref().unwrap_or(&self.card),
        }
    }
}

/// Webhook verification settings.
#[derive(Clone)]
pub struct WebhookConfig {
    /// Signing secret, usually `whsec_<base64>`
    pub secret: SecretString,
    /// Maximum distance between `webhook-timestamp` and now
    pub tolerance: Duration,
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "8787")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let rate_limit = parse_bool(
            "STOREFRONT_RATE_LIMIT",
            &get_env_or_default("STOREFRONT_RATE_LIMIT", "true"),
        )?;
        let cors_origins = parse_origins(&get_env_or_default("CORS_ORIGIN", DEFAULT_CORS_ORIGINS));

        let portone = PortOneConfig::from_lookup(get_optional_env)?;
        let webhook = WebhookConfig::from_lookup(get_optional_env)?;

        Ok(Self {
            database_url,
            host,
            port,
            cors_origins,
            rate_limit,
            portone,
            webhook,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl PortOneConfig {
    /// Build from a variable lookup. `Ok(None)` when no `PortOne` variable is set.
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let api_secret = get("PORTONE_API_SECRET");
        let store_id = get("PORTONE_STORE_ID");
        let card = get("PORTONE_CHANNEL_KEY_CARD");
        if api_secret.is_none() && store_id.is_none() && card.is_none() {
            return Ok(None);
        }

        let require = |value: Option<String>, key: &str| {
            value.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let api_secret = require(api_secret, "PORTONE_API_SECRET")?;
        let store_id = require(store_id, "PORTONE_STORE_ID")?;
        let card = require(card, "PORTONE_CHANNEL_KEY_CARD")?;
        validate_secret_strength(&api_secret, "PORTONE_API_SECRET")?;

        let api_base = get("PORTONE_API_BASE")
            .unwrap_or_else(|| DEFAULT_PORTONE_API_BASE.to_string());
        let api_base = Url::parse(&api_base).map_err(|e| {
            ConfigError::InvalidEnvVar("PORTONE_API_BASE".to_string(), e.to_string())
        })?;
        let timeout = parse_secs("PORTONE_TIMEOUT_SECS", get("PORTONE_TIMEOUT_SECS"), 10)?;

        Ok(Some(Self {
            api_secret: SecretString::from(api_secret),
            store_id,
            channel_keys: ChannelKeys {
                card,
                transfer: get("PORTONE_CHANNEL_KEY_TRANSFER"),
                virtual_account: get("PORTONE_CHANNEL_KEY_VIRTUAL_ACCOUNT"),
            },
            api_base,
            timeout,
        }))
    }
}

impl WebhookConfig {
    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let Some(secret) = get("PORTONE_WEBHOOK_SECRET") else {
            return Ok(None);
        };
        validate_secret_strength(&secret, "PORTONE_WEBHOOK_SECRET")?;
        let tolerance = parse_secs(
            "PORTONE_WEBHOOK_TOLERANCE_SECS",
            get("PORTONE_WEBHOOK_TOLERANCE_SECS"),
            300,
        )?;

        Ok(Some(Self {
            secret: SecretString::from(secret),
            tolerance,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn parse_secs(key: &str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(default));
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the value issued by PortOne."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const API_SECRET: &str = "aB3xY9mK2nL5pQ7rT0uW4zC6dE8fG1hJ";
    const WEBHOOK_SECRET: &str = "whsec_c2VjcmV0LWtleS1mb3Itd2ViaG9va3MtMTIzNDU2";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength(API_SECRET, "TEST_VAR").is_ok());
        assert!(validate_secret_strength(WEBHOOK_SECRET, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_portone_absent_is_none() {
        let config = PortOneConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_portone_partial_is_error() {
        let err = PortOneConfig::from_lookup(lookup(&[("PORTONE_API_SECRET", API_SECRET)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "PORTONE_STORE_ID"));
    }

    #[test]
    fn test_portone_defaults() {
        let config = PortOneConfig::from_lookup(lookup(&[
            ("PORTONE_API_SECRET", API_SECRET),
            ("PORTONE_STORE_ID", "store-1234"),
            ("PORTONE_CHANNEL_KEY_CARD", "channel-key-card"),
            ("PORTONE_CHANNEL_KEY_VIRTUAL_ACCOUNT", "channel-key-va"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.api_base.as_str(), "https://api.portone.io/");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.channel_keys.for_method(PayMethod::Card), "channel-key-card");
        assert_eq!(
            config.channel_keys.for_method(PayMethod::Transfer),
            "channel-key-card"
        );
        assert_eq!(
            config.channel_keys.for_method(PayMethod::VirtualAccount),
            "channel-key-va"
        );
    }

    #[test]
    fn test_portone_rejects_zero_timeout() {
        let result = PortOneConfig::from_lookup(lookup(&[
            ("PORTONE_API_SECRET", API_SECRET),
            ("PORTONE_STORE_ID", "store-1234"),
            ("PORTONE_CHANNEL_KEY_CARD", "channel-key-card"),
            ("PORTONE_TIMEOUT_SECS", "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_webhook_config() {
        assert!(WebhookConfig::from_lookup(lookup(&[])).unwrap().is_none());

        let config = WebhookConfig::from_lookup(lookup(&[
            ("PORTONE_WEBHOOK_SECRET", WEBHOOK_SECRET),
            ("PORTONE_WEBHOOK_TOLERANCE_SECS", "60"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.tolerance, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://a.example , ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8787,
            cors_origins: Vec::new(),
            rate_limit: false,
            portone: None,
            webhook: None,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8787);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PortOneConfig::from_lookup(lookup(&[
            ("PORTONE_API_SECRET", API_SECRET),
            ("PORTONE_STORE_ID", "store-1234"),
            ("PORTONE_CHANNEL_KEY_CARD", "channel-key-card"),
        ]))
        .unwrap()
        .unwrap();
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("store-1234"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(API_SECRET));

        let webhook = WebhookConfig {
            secret: SecretString::from(WEBHOOK_SECRET),
            tolerance: Duration::from_secs(300),
        };
        assert!(!format!("{webhook:?}").contains(WEBHOOK_SECRET));
    }
}
