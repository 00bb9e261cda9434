//! Integration tests for Tenant Cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tenant-cart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `sync_roundtrip` - Engine against the real sync server on a loopback port
//! - `sync_failures` - Engine against a mocked endpoint returning errors
//! - `cart_properties` - Property tests over random operation sequences
//! - `persistence` - File-backed storage across reopen
//!
//! This library holds the shared fixtures.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tenant_cart::{CartStore, MemoryStorage, SyncEndpointConfig};
use tenant_cart_core::{CatalogProduct, MergePolicy, ProductId};
use tenant_cart_server::{AppState, ServerConfig, TokenTable};
use tokio::task::JoinHandle;
use url::Url;

/// Storage key used by every fixture cart.
pub const STORAGE_KEY: &str = "cart-storage";

/// Bearer token the test server accepts for user `alice`.
pub const ALICE_TOKEN: &str = "tok_alice_0123456789";

/// Bearer token the test server accepts for user `bob`.
pub const BOB_TOKEN: &str = "tok_bob_01234567890";

/// A sync server listening on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server applying `policy`.
    ///
    /// # Panics
    ///
    /// Panics if the loopback listener cannot be bound.
    pub async fn start(policy: MergePolicy) -> Self {
        let config = ServerConfig {
            host: Ipv4Addr::LOCALHOST.into(),
            port: 0,
            tokens: TokenTable::new([(ALICE_TOKEN, "alice"), (BOB_TOKEN, "bob")]),
            merge_policy: policy,
            merge_receipt_ttl: Duration::from_secs(300),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let state = AppState::new(config);

        let listener = tokio::net::TcpListener::bind(state.config().socket_addr())
            .await
            .expect("bind loopback listener");
        let addr = listener.local_addr().expect("listener address");

        let app = tenant_cart_server::app(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL of the server.
    ///
    /// # Panics
    ///
    /// Never in practice; the address always forms a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).expect("loopback url")
    }

    /// Endpoint config pointing the engine at this server.
    #[must_use]
    pub fn endpoint(&self) -> SyncEndpointConfig {
        SyncEndpointConfig {
            base_url: self.base_url(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An empty in-memory cart.
///
/// # Panics
///
/// Never in practice; memory storage cannot fail to load.
#[must_use]
pub fn memory_cart() -> CartStore {
    CartStore::open(Arc::new(MemoryStorage::new()), STORAGE_KEY).expect("memory storage")
}

/// A catalog product with a whole-unit price.
#[must_use]
pub fn product(id: &str, price: i64) -> CatalogProduct {
    CatalogProduct {
        id: ProductId::new(id),
        name: Some(format!("Product {id}")),
        image: None,
        price: Decimal::new(price, 0),
        stock: None,
    }
}
