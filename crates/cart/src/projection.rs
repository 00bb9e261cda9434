//! Store-scoped view over the shared cart.
//!
//! A shopper may have two storefronts open at once, so scoping happens at this
//! read boundary instead of trusting a store id at every call site. Every
//! write made through a `StoreCart` carries its bound store id, which makes a
//! cross-store mutation impossible to express.

use rust_decimal::Decimal;

use tenant_cart_core::{
    CartItemInput, CartLineItem, CatalogProduct, OrderRequest, ProductId, StoreId, subtotal,
};

use crate::store::{AddOutcome, CartStore};

/// The cart of one store.
#[derive(Debug, Clone)]
pub struct StoreCart {
    cart: CartStore,
    store_id: StoreId,
}

impl StoreCart {
    pub(crate) const fn new(cart: CartStore, store_id: StoreId) -> Self {
        Self { cart, store_id }
    }

    /// The store this view is bound to.
    #[must_use]
    pub const fn store_id(&self) -> &StoreId {
        &self.store_id
    }

    /// Lines of this store, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.cart.with_items(|items| {
            items
                .iter()
                .filter(|line| line.store_id == self.store_id)
                .cloned()
                .collect()
        })
    }

    /// A single line of this store.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<CartLineItem> {
        self.cart.with_items(|items| {
            items
                .iter()
                .find(|line| line.is(&self.store_id, id))
                .cloned()
        })
    }

    /// Sum of `price * quantity` over this store's lines; zero when empty.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.cart.with_items(|items| {
            subtotal(items.iter().filter(|line| line.store_id == self.store_id))
        })
    }

    /// Sum of quantities over this store's lines.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.cart.with_items(|items| {
            items
                .iter()
                .filter(|line| line.store_id == self.store_id)
                .map(|line| u64::from(line.quantity))
                .sum()
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Whether this store's cart drawer is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.cart.is_open(&self.store_id)
    }

    /// Flip the drawer flag. Does not touch the lines.
    pub fn toggle_cart(&self) -> bool {
        self.cart.toggle_open(&self.store_id)
    }

    /// Add a catalog product to this store's cart.
    pub fn add_item(&self, product: &CatalogProduct, quantity: u32) -> AddOutcome {
        self.cart.add_item(
            CartItemInput::from_catalog(self.store_id.clone(), product),
            quantity,
        )
    }

    /// Set a line's quantity; below 1 removes it.
    pub fn update_quantity(&self, id: &ProductId, quantity: i64) -> Option<u32> {
        self.cart.update_quantity(id, quantity, &self.store_id)
    }

    /// Remove a line. Returns whether one was present.
    pub fn remove_item(&self, id: &ProductId) -> bool {
        self.cart.remove_item(id, &self.store_id)
    }

    /// Remove every line of this store.
    pub fn clear(&self) -> usize {
        self.cart.clear_store_cart(&self.store_id)
    }

    /// Order payload for the checkout collaborator, `None` for an empty cart.
    #[must_use]
    pub fn order_request(&self) -> Option<OrderRequest> {
        let lines = self.items();
        if lines.is_empty() {
            return None;
        }

        let subtotal = subtotal(&lines);
        let item_count = lines.iter().map(|line| u64::from(line.quantity)).sum();

        Some(OrderRequest {
            store_id: self.store_id.clone(),
            lines,
            subtotal,
            item_count,
        })
    }

    /// Called once the order was placed: empties this store's cart only.
    pub fn complete_checkout(&self) -> usize {
        tracing::info!(store_id = %self.store_id, "Checkout completed");
        self.clear()
    }
}
