//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `IYZICO_API_KEY` - Payment gateway API key
//! - `IYZICO_SECRET_KEY` - Payment gateway secret used for request signing
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `IYZICO_BASE_URL` - Gateway base URL (default: <https://sandbox-api.iyzipay.com>)
//! - `IYZICO_LOCALE` - Gateway locale (default: tr)
//! - `IYZICO_CURRENCY` - Storefront currency (default: TRY)
//! - `IYZICO_BUYER_IDENTITY_NUMBER` - Identity number sent for buyers (default: 11111111111)
//! - `IYZICO_BASKET_CATEGORY` - Category sent for basket items (default: Clothing)
//! - `CHECKOUT_CALLBACK_URL` - URL the bank redirects to (default: `<base_url>/payment/3ds-return`)
//! - `CHECKOUT_BRIDGE_ORIGIN` - Origin allowed to post frame messages (default: origin of the callback URL)
//! - `CHECKOUT_VERIFY_DELAY_MS` - Wait before the first verification call (default: 1000)
//! - `CHECKOUT_CONFIRMATION_DELAY_MS` - Success message display time before redirect (default: 3000)
//! - `CHECKOUT_BRIDGE_REDIRECT_DELAY_MS` - Bridge page delay before top-level redirect (default: 1000)
//! - `CHECKOUT_PENDING_TTL_MINUTES` - Age after which a pending payment expires (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;
use vitrin_core::CurrencyCode;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Path of the application callback route.
pub const PAYMENT_CALLBACK_PATH: &str = "/payment-callback";

/// Path of the redirect bridge served by this binary.
pub const BRIDGE_PATH: &str = "/payment/3ds-return";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Payment gateway configuration
    pub iyzico: IyzicoConfig,
    /// Checkout flow configuration
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct IyzicoConfig {
    /// Gateway base URL, without trailing slash
    pub base_url: String,
    /// API key sent in the authorization header
    pub api_key: SecretString,
    /// Secret key used for HMAC request signing
    pub secret_key: SecretString,
    /// Locale sent with every request
    pub locale: String,
    /// The storefront's single market currency
    pub currency: CurrencyCode,
    /// Identity number sent for buyers
    pub buyer_identity_number: String,
    /// Category sent for basket items
    pub basket_category: String,
}

impl std::fmt::Debug for IyzicoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IyzicoConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .field("locale", &self.locale)
            .field("currency", &self.currency)
            .field("buyer_identity_number", &self.buyer_identity_number)
            .field("basket_category", &self.basket_category)
            .finish()
    }
}

/// Checkout flow configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// URL the bank redirects to after authentication (the bridge)
    pub callback_url: String,
    /// Origin the bridge page runs under; frame messages from other origins are ignored
    pub bridge_origin: String,
    /// Origin of the storefront itself; the bridge posts messages to it
    pub frontend_origin: String,
    /// Delay before the first verification call
    pub verify_delay: Duration,
    /// How long the success message is shown before redirecting
    pub confirmation_delay: Duration,
    /// Delay before the bridge performs its top-level redirect
    pub bridge_redirect_delay: Duration,
    /// Age after which a pending payment is treated as abandoned
    pub pending_ttl: Duration,
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
        let port = get_parsed_or_default("STOREFRONT_PORT", 3000_u16)?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let iyzico = IyzicoConfig::from_env()?;
        let checkout = CheckoutConfig::from_env(&base_url)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            iyzico,
            checkout,
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

impl IyzicoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("IYZICO_CURRENCY", "TRY")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("IYZICO_CURRENCY".to_string(), e))?;

        Ok(Self {
            base_url: get_env_or_default("IYZICO_BASE_URL", "https://sandbox-api.iyzipay.com")
                .trim_end_matches('/')
                .to_string(),
            api_key: get_required_secret("IYZICO_API_KEY")?,
            secret_key: get_validated_secret("IYZICO_SECRET_KEY")?,
            locale: get_env_or_default("IYZICO_LOCALE", "tr"),
            currency,
            buyer_identity_number: get_env_or_default("IYZICO_BUYER_IDENTITY_NUMBER", "11111111111"),
            basket_category: get_env_or_default("IYZICO_BASKET_CATEGORY", "Clothing"),
        })
    }
}

impl CheckoutConfig {
    fn from_env(base_url: &str) -> Result<Self, ConfigError> {
        let callback_url = get_optional_env("CHECKOUT_CALLBACK_URL")
            .unwrap_or_else(|| format!("{base_url}{BRIDGE_PATH}"));
        let frontend_origin = origin_of(base_url, "STOREFRONT_BASE_URL")?;
        let bridge_origin = match get_optional_env("CHECKOUT_BRIDGE_ORIGIN") {
            Some(origin) => origin.trim_end_matches('/').to_string(),
            None => origin_of(&callback_url, "CHECKOUT_CALLBACK_URL")?,
        };

        let pending_ttl = pending_ttl(get_parsed_or_default(
            "CHECKOUT_PENDING_TTL_MINUTES",
            30_u64,
        )?)?;

        Ok(Self {
            callback_url,
            bridge_origin,
            frontend_origin,
            verify_delay: Duration::from_millis(get_parsed_or_default(
                "CHECKOUT_VERIFY_DELAY_MS",
                1000_u64,
            )?),
            confirmation_delay: Duration::from_millis(get_parsed_or_default(
                "CHECKOUT_CONFIRMATION_DELAY_MS",
                3000_u64,
            )?),
            bridge_redirect_delay: Duration::from_millis(get_parsed_or_default(
                "CHECKOUT_BRIDGE_REDIRECT_DELAY_MS",
                1000_u64,
            )?),
            pending_ttl,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Pending-payment TTL from minutes. Rejects values whose age comparison
/// would overflow.
fn pending_ttl(minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .filter(|ttl| chrono::Duration::from_std(*ttl).is_ok())
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "CHECKOUT_PENDING_TTL_MINUTES".to_string(),
                format!("{minutes} minutes is out of range"),
            )
        })
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

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

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to a default.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// ASCII origin (`scheme://host[:port]`) of a URL.
fn origin_of(raw: &str, var_name: &str) -> Result<String, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    Ok(url.origin().ascii_serialization())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
    let len = s.chars().count() as f64;
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn iyzico_config() -> IyzicoConfig {
        IyzicoConfig {
            base_url: "https://sandbox-api.iyzipay.com".to_string(),
            api_key: SecretString::from("sandbox-api-key-value"),
            secret_key: SecretString::from("sandbox-secret-key-value"),
            locale: "tr".to_string(),
            currency: CurrencyCode::TRY,
            buyer_identity_number: "11111111111".to_string(),
            basket_category: "Clothing".to_string(),
        }
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
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_pending_ttl_from_minutes() {
        assert_eq!(pending_ttl(30).unwrap(), Duration::from_secs(1800));
        assert_eq!(pending_ttl(0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_pending_ttl_rejects_overflowing_minutes() {
        assert!(matches!(
            pending_ttl(u64::MAX),
            Err(ConfigError::InvalidEnvVar(ref key, _)) if key == "CHECKOUT_PENDING_TTL_MINUTES"
        ));
        assert!(pending_ttl(u64::MAX / 60).is_err());
    }

    #[test]
    fn test_origin_of_strips_path() {
        let origin = origin_of("https://shop.example.com/payment/3ds-return", "X").unwrap();
        assert_eq!(origin, "https://shop.example.com");

        let with_port = origin_of("http://localhost:3000/a?b=c", "X").unwrap();
        assert_eq!(with_port, "http://localhost:3000");
    }

    #[test]
    fn test_origin_of_rejects_garbage() {
        assert!(matches!(
            origin_of("not a url", "CHECKOUT_CALLBACK_URL"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_iyzico_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", iyzico_config());

        assert!(debug_output.contains("sandbox-api.iyzipay.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sandbox-api-key-value"));
        assert!(!debug_output.contains("sandbox-secret-key-value"));
    }
}
