//! Application state shared across handlers.

use std::sync::Arc;

use crate::carts::CartRepository;
use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    carts: CartRepository,
}

impl AppState {
    /// Create a new application state with an empty cart repository.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let carts = CartRepository::new(config.merge_policy, config.merge_receipt_ttl);
        Self {
            inner: Arc::new(AppStateInner { config, carts }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the cart repository.
    #[must_use]
    pub fn carts(&self) -> &CartRepository {
        &self.inner.carts
    }
}
