//! In-memory server carts keyed by user.
//!
//! Merging syncs carry a `mergeId`. The result of an applied merge is kept in
//! a `moka` cache for the receipt TTL, so a client retrying the same login
//! transition gets the stored cart back instead of a second union.
//!
//! A merge may also carry a baseline: the cart this server returned to the
//! client last time. Under the additive policy only quantities above it are
//! added, so a client resending a cart it already synced changes nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use tenant_cart_core::{
    CartLineItem, CartSyncRequest, MergePolicy, UserId, fold_duplicates, merge_since,
};

const MAX_RECEIPTS: u64 = 10_000;

/// What a sync did to the stored cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// The request was applied; carries the new cart.
    Applied(Vec<CartLineItem>),
    /// The `mergeId` was already applied; carries the stored result.
    Replayed(Vec<CartLineItem>),
}

impl SyncResult {
    #[must_use]
    pub fn into_items(self) -> Vec<CartLineItem> {
        match self {
            Self::Applied(items) | Self::Replayed(items) => items,
        }
    }
}

/// Server-side cart storage.
///
/// Cheaply cloneable; clones share the same carts.
#[derive(Clone)]
pub struct CartRepository {
    inner: Arc<CartRepositoryInner>,
}

struct CartRepositoryInner {
    carts: RwLock<HashMap<UserId, Vec<CartLineItem>>>,
    receipts: Cache<(UserId, Uuid), Vec<CartLineItem>>,
    policy: MergePolicy,
}

impl std::fmt::Debug for CartRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRepository")
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl CartRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new(policy: MergePolicy, receipt_ttl: Duration) -> Self {
        let receipts = Cache::builder()
            .max_capacity(MAX_RECEIPTS)
            .time_to_live(receipt_ttl)
            .build();

        Self {
            inner: Arc::new(CartRepositoryInner {
                carts: RwLock::new(HashMap::new()),
                receipts,
                policy,
            }),
        }
    }

    /// The stored cart of `user`; empty when none was ever synced.
    pub async fn get(&self, user: &UserId) -> Vec<CartLineItem> {
        self.inner
            .carts
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Apply a sync request for `user`.
    ///
    /// The receipt lookup happens under the write lock, so two concurrent
    /// retries of one `mergeId` cannot both merge.
    #[instrument(
        skip(self, request),
        fields(
            user_id = %user,
            items = request.items.len(),
            baseline = request.baseline.len(),
            merge = request.merge
        )
    )]
    pub async fn sync(&self, user: &UserId, request: CartSyncRequest) -> SyncResult {
        let mut carts = self.inner.carts.write().await;

        if let Some(merge_id) = request.merge_id {
            let key = (user.clone(), merge_id);
            if let Some(items) = self.inner.receipts.get(&key).await {
                debug!(%merge_id, "Merge already applied, returning stored result");
                return SyncResult::Replayed(items);
            }
        }

        let current = carts.get(user).map(Vec::as_slice).unwrap_or_default();
        let items = if request.merge {
            merge_since(current, &request.items, &request.baseline, self.inner.policy)
        } else {
            fold_duplicates(request.items)
        };

        info!(
            lines = items.len(),
            policy = %self.inner.policy,
            "Server cart updated"
        );
        carts.insert(user.clone(), items.clone());

        if let Some(merge_id) = request.merge_id {
            self.inner
                .receipts
                .insert((user.clone(), merge_id), items.clone())
                .await;
        }

        SyncResult::Applied(items)
    }
}
