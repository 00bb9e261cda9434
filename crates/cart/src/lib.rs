//! Tenant Cart engine library.
//!
//! A process-wide cart shared by many independently themed storefronts. The
//! engine partitions lines per store, survives restarts through durable
//! storage, and reconciles a guest cart with the server cart exactly once per
//! login.
//!
//! # Components
//!
//! - [`store::CartStore`] - the single source of truth for every store's lines
//! - [`projection::StoreCart`] - a store-scoped view used by all UI surfaces
//! - [`notification::NotificationChannel`] - single-slot toast messages
//! - [`sync::SyncCoordinator`] - the login-time merge protocol
//! - [`storage`] - durable key-value backends
//!
//! # Example
//!
//! ```rust,ignore
//! use tenant_cart::{CartStore, MemoryStorage};
//!
//! let cart = CartStore::open(Arc::new(MemoryStorage::new()), "cart-storage")?;
//! let store = cart.for_store("s1");
//! store.add_item(&product, 2);
//! assert_eq!(store.total_count(), 2);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod notification;
pub mod projection;
pub mod storage;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use config::{CartConfig, ConfigError, SyncEndpointConfig};
pub use error::{CartError, Result};
pub use notification::NotificationChannel;
pub use projection::StoreCart;
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError, SyncBaseline};
pub use store::{AddOutcome, CartStore};
pub use sync::{
    CartSyncApi, HttpCartSync, SessionCredential, SkipReason, SyncCoordinator, SyncError,
    SyncOutcome,
};
