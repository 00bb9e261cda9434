//! Unified error handling with Sentry integration.
//!
//! Expected cart conditions (missing line, empty cart, over-stock request) are
//! normalised in place and never reach this type. `CartError` carries only the
//! failures callers have to handle: configuration, an unavailable storage
//! backend at start-up, and sync transport errors.

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::sync::SyncError;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Durable storage is unavailable.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cart synchronisation failed.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for cart activity.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// mutations leading up to an error. Without an initialised Sentry client
/// this is a no-op.
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
