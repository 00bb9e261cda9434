//! Sync server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_SERVER_TOKENS` - Comma separated `token:user_id` pairs accepted as
//!   bearer credentials
//!
//! ## Optional
//! - `CART_SERVER_HOST` - Bind address (default: 127.0.0.1)
//! - `CART_SERVER_PORT` - Listen port (default: 3100)
//! - `CART_MERGE_POLICY` - `sum`, `max` or `server_wins` (default: sum)
//! - `CART_MERGE_RECEIPT_TTL_SECS` - How long an applied `mergeId` is
//!   remembered (default: 86400)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use tenant_cart_core::{MergePolicy, UserId};

const MIN_TOKEN_LENGTH: usize = 16;

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

/// Sync server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Accepted bearer tokens
    pub tokens: TokenTable,
    /// Union rule applied to merging syncs
    pub merge_policy: MergePolicy,
    /// Retention of applied merge ids
    pub merge_receipt_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Bearer token to user lookup.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Default)]
pub struct TokenTable {
    entries: Vec<(SecretString, UserId)>,
}

impl std::fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTable")
            .field("tokens", &"[REDACTED]")
            .field(
                "users",
                &self.entries.iter().map(|(_, u)| u.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl TokenTable {
    /// Build a table from `(token, user)` pairs.
    #[must_use]
    pub fn new<I, T, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (T, U)>,
        T: Into<String>,
        U: Into<UserId>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(t, u)| (SecretString::from(t.into()), u.into()))
                .collect(),
        }
    }

    /// Parse `token:user_id[,token:user_id...]`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on malformed pairs or tokens shorter than 16 characters.
    pub fn parse(raw: &str, var_name: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((token, user)) = pair.split_once(':') else {
                return Err(ConfigError::InvalidEnvVar(
                    var_name.to_string(),
                    "expected token:user_id pairs".to_string(),
                ));
            };
            let (token, user) = (token.trim(), user.trim());
            if user.is_empty() {
                return Err(ConfigError::InvalidEnvVar(
                    var_name.to_string(),
                    "user_id must not be empty".to_string(),
                ));
            }
            if token.len() < MIN_TOKEN_LENGTH {
                return Err(ConfigError::InsecureSecret(
                    var_name.to_string(),
                    format!(
                        "tokens must be at least {MIN_TOKEN_LENGTH} characters (got {})",
                        token.len()
                    ),
                ));
            }
            entries.push((SecretString::from(token.to_string()), UserId::new(user)));
        }

        if entries.is_empty() {
            return Err(ConfigError::MissingEnvVar(var_name.to_string()));
        }
        Ok(Self { entries })
    }

    /// The user a bearer token belongs to.
    #[must_use]
    pub fn user_for(&self, token: &str) -> Option<&UserId> {
        self.entries
            .iter()
            .find(|(secret, _)| {
                constant_time_eq(secret.expose_secret().as_bytes(), token.as_bytes())
            })
            .map(|(_, user)| user)
    }
}

/// Compare two byte strings without an early exit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl ServerConfig {
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

        let host = get_env_or_default("CART_SERVER_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CART_SERVER_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("CART_SERVER_PORT", "3100")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CART_SERVER_PORT".to_string(), e.to_string())
            })?;
        let tokens = TokenTable::parse(
            &get_required_env("CART_SERVER_TOKENS")?,
            "CART_SERVER_TOKENS",
        )?;
        let merge_policy = get_env_or_default("CART_MERGE_POLICY", "sum")
            .parse::<MergePolicy>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CART_MERGE_POLICY".to_string(), e.to_string())
            })?;
        let merge_receipt_ttl = get_env_or_default("CART_MERGE_RECEIPT_TTL_SECS", "86400")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "CART_MERGE_RECEIPT_TTL_SECS".to_string(),
                    e.to_string(),
                )
            })?;

        Ok(Self {
            host,
            port,
            tokens,
            merge_policy,
            merge_receipt_ttl,
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

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
