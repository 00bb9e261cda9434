//! Request and response bodies of the cart-sync endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::CartLineItem;

/// Body of `POST /api/cart/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSyncRequest {
    pub items: Vec<CartLineItem>,
    /// Union with the server cart when true, replace it when false.
    pub merge: bool,
    /// Idempotency key for one login transition; retries reuse it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_id: Option<Uuid>,
    /// Lines this client last received from the same user's server cart.
    ///
    /// Only quantities above the baseline count as new guest additions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub baseline: Vec<CartLineItem>,
}

impl CartSyncRequest {
    /// A merging request carrying the guest cart.
    #[must_use]
    pub const fn merge(items: Vec<CartLineItem>, merge_id: Uuid) -> Self {
        Self {
            items,
            merge: true,
            merge_id: Some(merge_id),
            baseline: Vec::new(),
        }
    }

    /// A replacing request; the server cart becomes `items`.
    #[must_use]
    pub const fn replace(items: Vec<CartLineItem>) -> Self {
        Self {
            items,
            merge: false,
            merge_id: None,
            baseline: Vec::new(),
        }
    }

    /// Attach the lines already known to be on the server.
    #[must_use]
    pub fn with_baseline(mut self, baseline: Vec<CartLineItem>) -> Self {
        self.baseline = baseline;
        self
    }
}

/// Body returned by the sync endpoint: the resulting server cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSyncResponse {
    pub items: Vec<CartLineItem>,
}
