//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PIZZA_DATABASE_URL` - `PostgreSQL` connection string, or `memory` for
//!   the in-memory backend (falls back to `DATABASE_URL`)
//! - `PIZZA_FACTORY_URL` - Base URL of the pizza factory API
//! - `PIZZA_FACTORY_API_KEY` - Pre-shared factory credential (high entropy)
//! - `PIZZA_SIGNING_SECRET` - HMAC key for signing factory requests (min 32 chars, high entropy)
//!
//! ## Optional
//! - `PIZZA_HOST` - Bind address (default: 127.0.0.1)
//! - `PIZZA_PORT` - Listen port (default: 3000)
//! - `PIZZA_FACTORY_TIMEOUT_SECS` - Factory request timeout (default: 10)
//! - `PIZZA_LIST_PER_PAGE` - Page size for order and franchise lists (default: 10)
//! - `PIZZA_EXPOSE_ERROR_DETAIL` - Include error detail in 500 responses (default: false)
//! - `PIZZA_METRICS_URL` - Metrics push endpoint
//! - `PIZZA_LOGS_URL` - Log push endpoint
//! - `PIZZA_TELEMETRY_API_KEY` - Bearer key for both telemetry endpoints
//! - `PIZZA_METRICS_INTERVAL_SECS` - Metrics flush interval (default: 10)
//! - `PIZZA_LOG_QUEUE_CAPACITY` - Log queue bound (default: 1024)
//! - `PIZZA_SOURCE` - Source label on metrics and logs (default: pizza-service)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

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

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Factory API configuration
    pub factory: FactoryConfig,
    /// Page size for order and franchise listings
    pub list_per_page: u32,
    /// Whether 500 responses carry error detail
    pub expose_error_detail: bool,
    /// Metrics and log shipping configuration
    pub telemetry: TelemetryConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Factory API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct FactoryConfig {
    /// Base URL; orders go to `{url}/api/order`
    pub url: Url,
    /// Pre-shared credential sent as a bearer token
    pub api_key: SecretString,
    /// HMAC key for request signatures
    pub signing_secret: SecretString,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for FactoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryConfig")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("signing_secret", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Telemetry shipping configuration.
///
/// With no URLs configured, metrics and logs go to the local `tracing`
/// output instead.
#[derive(Clone)]
pub struct TelemetryConfig {
    pub metrics_url: Option<Url>,
    pub logs_url: Option<Url>,
    pub api_key: Option<SecretString>,
    pub metrics_interval_secs: u64,
    pub log_queue_capacity: usize,
    /// Source label attached to every metric and log stream
    pub source: String,
}

impl std::fmt::Debug for TelemetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryConfig")
            .field("metrics_url", &self.metrics_url.as_ref().map(Url::as_str))
            .field("logs_url", &self.logs_url.as_ref().map(Url::as_str))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("metrics_interval_secs", &self.metrics_interval_secs)
            .field("log_queue_capacity", &self.log_queue_capacity)
            .field("source", &self.source)
            .finish()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_url: None,
            logs_url: None,
            api_key: None,
            metrics_interval_secs: 10,
            log_queue_capacity: 1024,
            source: "pizza-service".to_string(),
        }
    }
}

impl ServiceConfig {
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

        let database_url = get_database_url("PIZZA_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("PIZZA_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("PIZZA_PORT", "3000")?;
        let list_per_page = parse_env_or_default::<u32>("PIZZA_LIST_PER_PAGE", "10")?;
        if list_per_page == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PIZZA_LIST_PER_PAGE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let expose_error_detail = parse_env_or_default::<bool>("PIZZA_EXPOSE_ERROR_DETAIL", "false")?;

        let factory = FactoryConfig::from_env()?;
        let telemetry = TelemetryConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            factory,
            list_per_page,
            expose_error_detail,
            telemetry,
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

/// Load only the database URL.
///
/// For tools such as the CLI that need the database but none of the
/// service's other settings.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither `PIZZA_DATABASE_URL` nor
/// `DATABASE_URL` is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    let _ = dotenvy::dotenv();
    get_database_url("PIZZA_DATABASE_URL")
}

impl FactoryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let signing_secret = get_validated_secret("PIZZA_SIGNING_SECRET")?;
        validate_secret_length(&signing_secret, "PIZZA_SIGNING_SECRET")?;

        Ok(Self {
            url: parse_url("PIZZA_FACTORY_URL", &get_required_env("PIZZA_FACTORY_URL")?)?,
            api_key: get_validated_secret("PIZZA_FACTORY_API_KEY")?,
            signing_secret,
            timeout_secs: parse_env_or_default("PIZZA_FACTORY_TIMEOUT_SECS", "10")?,
        })
    }
}

impl TelemetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let metrics_url = get_optional_env("PIZZA_METRICS_URL")
            .map(|v| parse_url("PIZZA_METRICS_URL", &v))
            .transpose()?;
        let logs_url = get_optional_env("PIZZA_LOGS_URL")
            .map(|v| parse_url("PIZZA_LOGS_URL", &v))
            .transpose()?;

        Ok(Self {
            metrics_url,
            logs_url,
            api_key: get_optional_env("PIZZA_TELEMETRY_API_KEY").map(SecretString::from),
            metrics_interval_secs: parse_env_or_default("PIZZA_METRICS_INTERVAL_SECS", "10")?,
            log_queue_capacity: parse_env_or_default("PIZZA_LOG_QUEUE_CAPACITY", "1024")?,
            source: get_env_or_default("PIZZA_SOURCE", "pizza-service"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
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

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_SECRET_LENGTH,
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
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
        let err = validate_secret_strength("your-factory-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength(&"z".repeat(40), "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST_VAR").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_url_rejects_garbage() {
        let err = parse_url("PIZZA_FACTORY_URL", "not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "PIZZA_FACTORY_URL"));
    }

    #[test]
    fn test_factory_config_debug_redacts_secrets() {
        let config = FactoryConfig {
            url: Url::parse("https://factory.example.com").unwrap(),
            api_key: SecretString::from("live-api-key-value"),
            signing_secret: SecretString::from("live-signing-secret-value"),
            timeout_secs: 10,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("live-api-key-value"));
        assert!(!debug.contains("live-signing-secret-value"));
    }
}
