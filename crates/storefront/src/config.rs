//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CATALOG_API_URL` - Base URL of the catalog REST API
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `CATALOG_TIMEOUT_SECS` - Catalog request timeout (default: 20)
//! - `CATALOG_CACHE_TTL_SECS` - Reference list and search cache TTL (default: 60)
//! - `SEARCH_DEBOUNCE_MS` - Autocomplete quiet period (default: 300)
//! - `LOGIN_ALERT_MS` - Login prompt auto-dismiss delay (default: 6000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Catalog API configuration
    pub catalog: CatalogConfig,
    /// Autocomplete debounce quiet period
    pub search_debounce: Duration,
    /// How long the login prompt stays visible
    pub login_alert_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (production, staging, ...)
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Catalog API client configuration.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Normalized base URL (no trailing slash, no trailing `/health`)
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// TTL for cached reference lists and search pages
    pub cache_ttl: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let catalog = CatalogConfig::from_env()?;
        let search_debounce = Duration::from_millis(parse_env("SEARCH_DEBOUNCE_MS", "300")?);
        let login_alert_ttl = Duration::from_millis(parse_env("LOGIN_ALERT_MS", "6000")?);

        Ok(Self {
            host,
            port,
            base_url,
            catalog,
            search_debounce,
            login_alert_ttl,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the storefront is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("CATALOG_API_URL")?;
        Ok(Self {
            base_url: normalize_base_url(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar("CATALOG_API_URL".to_string(), e))?,
            timeout: Duration::from_secs(parse_env("CATALOG_TIMEOUT_SECS", "20")?),
            cache_ttl: Duration::from_secs(parse_env("CATALOG_CACHE_TTL_SECS", "60")?),
        })
    }
}

/// Normalize a catalog base URL.
///
/// Strips trailing slashes and a trailing `/health` segment, which operators
/// tend to paste from the API's health-check URL.
///
/// # Errors
///
/// Returns a description of the problem if the result is not an absolute
/// http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String, String> {
    const HEALTH: &str = "/health";

    let mut base = raw.trim().trim_end_matches('/');
    let split = base.len().saturating_sub(HEALTH.len());
    if let Some(tail) = base.get(split..)
        && tail.eq_ignore_ascii_case(HEALTH)
    {
        base = base.get(..split).unwrap_or(base).trim_end_matches('/');
    }

    let parsed = Url::parse(base).map_err(|e| e.to_string())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", parsed.scheme()));
    }
    Ok(base.to_string())
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
