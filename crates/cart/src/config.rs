//! Cart engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_STORAGE_DIR` - Directory for durable cart storage (default: .tenant-cart)
//! - `CART_STORAGE_KEY` - Key the cart is persisted under (default: cart-storage)
//! - `CART_SYNC_URL` - Base URL of the cart-sync endpoint; sync is disabled without it
//! - `CART_SYNC_TIMEOUT_SECS` - Timeout for the sync request (default: 10)
//! - `CART_NOTIFICATION_TTL_MS` - Toast display duration (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".tenant-cart";
const DEFAULT_STORAGE_KEY: &str = "cart-storage";
const DEFAULT_SYNC_TIMEOUT_SECS: &str = "10";
const DEFAULT_NOTIFICATION_TTL_MS: &str = "3000";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Directory holding the durable cart file
    pub storage_dir: PathBuf,
    /// Key the cart is persisted under
    pub storage_key: String,
    /// Sync endpoint, if login-time merging is enabled
    pub sync: Option<SyncEndpointConfig>,
    /// How long a notification stays visible
    pub notification_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Cart-sync endpoint configuration.
#[derive(Debug, Clone)]
pub struct SyncEndpointConfig {
    /// Base URL; requests go to `{base_url}/api/cart/sync`
    pub base_url: Url,
    /// Request timeout; an elapsed timeout counts as a failed sync
    pub timeout: Duration,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Config` if a variable is present but cannot be parsed.
    pub fn from_env() -> crate::Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_dir = PathBuf::from(get_or_default(&lookup, "CART_STORAGE_DIR", DEFAULT_STORAGE_DIR));
        let storage_key = get_or_default(&lookup, "CART_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        if storage_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_STORAGE_KEY".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let sync = match lookup("CART_SYNC_URL") {
            Some(raw) => Some(SyncEndpointConfig {
                base_url: Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("CART_SYNC_URL".to_string(), e.to_string())
                })?,
                timeout: Duration::from_secs(parse_u64(
                    &lookup,
                    "CART_SYNC_TIMEOUT_SECS",
                    DEFAULT_SYNC_TIMEOUT_SECS,
                )?),
            }),
            None => None,
        };

        let notification_ttl = Duration::from_millis(parse_u64(
            &lookup,
            "CART_NOTIFICATION_TTL_MS",
            DEFAULT_NOTIFICATION_TTL_MS,
        )?);

        Ok(Self {
            storage_dir,
            storage_key,
            sync,
            notification_ttl,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a variable with a default value.
fn get_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse an unsigned integer variable with a default value.
fn parse_u64<F>(lookup: &F, key: &str, default: &str) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get_or_default(lookup, key, default)
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
