//! HTTP client for the cart-sync endpoint.
//!
//! Timeouts come from the shared client configuration; an elapsed timeout
//! surfaces as `SyncError::Http` and is handled like any other failure.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, instrument};
use url::Url;

use tenant_cart_core::{CartLineItem, CartSyncRequest, CartSyncResponse};

use super::{CartSyncApi, SessionCredential, SyncError};
use crate::config::SyncEndpointConfig;

/// Path of the sync endpoint relative to the configured base URL.
const SYNC_PATH: &str = "api/cart/sync";

/// `reqwest`-backed [`CartSyncApi`].
#[derive(Debug, Clone)]
pub struct HttpCartSync {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCartSync {
    /// Create a client for the endpoint described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL cannot be built or the HTTP client
    /// fails to build.
    pub fn new(config: &SyncEndpointConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint_url(&config.base_url)?,
        })
    }

    /// The full URL requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Join the sync path onto `base`, keeping any path prefix `base` carries.
fn endpoint_url(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(SYNC_PATH)
}

#[async_trait]
impl CartSyncApi for HttpCartSync {
    #[instrument(skip(self, credential, request), fields(items = request.items.len()))]
    async fn sync_cart(
        &self,
        credential: &SessionCredential,
        request: &CartSyncRequest,
    ) -> Result<Vec<CartLineItem>, SyncError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(credential.token.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Unauthorized(if message.is_empty() {
                status.to_string()
            } else {
                message
            }));
        }

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(SyncError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let body: CartSyncResponse = response.json().await?;
        debug!(items = body.items.len(), "Sync endpoint returned merged cart");
        Ok(body.items)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_endpoint_url_without_prefix() {
        let base = Url::parse("http://localhost:3100").unwrap();
        assert_eq!(
            endpoint_url(&base).unwrap().as_str(),
            "http://localhost:3100/api/cart/sync"
        );
    }

    #[test]
    fn test_endpoint_url_keeps_prefix() {
        let base = Url::parse("https://shop.example/v2").unwrap();
        assert_eq!(
            endpoint_url(&base).unwrap().as_str(),
            "https://shop.example/v2/api/cart/sync"
        );
    }

    #[test]
    fn test_client_builds_from_config() {
        let client = HttpCartSync::new(&SyncEndpointConfig {
            base_url: Url::parse("http://127.0.0.1:3100/").unwrap(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        assert_eq!(client.endpoint().path(), "/api/cart/sync");
    }
}
