//! Cart line items and the inputs used to create them.
//!
//! A line item is identified by `(store_id, id)`. Within one cart that pair is
//! unique and `quantity` is never below 1; the engine removes a line rather
//! than storing a zero quantity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ProductId, StoreId};

/// One product entry in a shopper's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Product identifier, unique within a store's cart.
    pub id: ProductId,
    /// Owning store.
    pub store_id: StoreId,
    /// Display name captured at add-time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Image URL captured at add-time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Unit price in the store's currency.
    pub price: Decimal,
    /// Always at least 1.
    pub quantity: u32,
    /// Advisory upper bound advertised by the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
}

impl CartLineItem {
    /// Build a line from an add input and an initial quantity.
    ///
    /// The quantity is clamped into `1..=stock`.
    #[must_use]
    pub fn from_input(input: CartItemInput, quantity: u32) -> Self {
        let mut line = Self {
            id: input.id,
            store_id: input.store_id,
            name: input.name,
            image: input.image,
            price: input.price,
            quantity: 1,
            stock: input.stock,
        };
        line.quantity = line.clamp_quantity(u64::from(quantity));
        line
    }

    /// Whether this line is the `(store_id, id)` pair given.
    #[must_use]
    pub fn is(&self, store_id: &StoreId, id: &ProductId) -> bool {
        &self.store_id == store_id && &self.id == id
    }

    /// Whether `other` occupies the same cart slot as this line.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.is(&other.store_id, &other.id)
    }

    /// `price * quantity`, saturating at the `Decimal` bounds.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Clamp a requested quantity to `1..=stock` (or `1..=u32::MAX` without stock).
    ///
    /// A stock of zero still yields 1: the line exists, and rejecting it is
    /// checkout's job.
    #[must_use]
    pub fn clamp_quantity(&self, requested: u64) -> u32 {
        let ceiling = self.stock.map_or(u32::MAX, |stock| stock.max(1));
        let requested = u32::try_from(requested).unwrap_or(u32::MAX);
        requested.clamp(1, ceiling)
    }

    /// Whether the catalog's stock bound would cut `requested` down.
    #[must_use]
    pub fn exceeds_stock(&self, requested: u64) -> bool {
        self.stock
            .is_some_and(|stock| requested > u64::from(stock.max(1)))
    }
}

/// Read-only product data supplied by a tenant's catalog.
///
/// The cart trusts this snapshot until checkout re-validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogProduct {
    pub id: ProductId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: Option<u32>,
}

/// Input to `add_item`: a catalog snapshot bound to its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItemInput {
    pub id: ProductId,
    pub store_id: StoreId,
    pub name: Option<String>,
    pub image: Option<String>,
    pub price: Decimal,
    pub stock: Option<u32>,
}

impl CartItemInput {
    /// Create an input with only the required fields.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, store_id: impl Into<StoreId>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            store_id: store_id.into(),
            name: None,
            image: None,
            price,
            stock: None,
        }
    }

    /// Bind a catalog product to the store it was listed in.
    #[must_use]
    pub fn from_catalog(store_id: StoreId, product: &CatalogProduct) -> Self {
        Self {
            id: product.id.clone(),
            store_id,
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price,
            stock: product.stock,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }
}

/// Sum of line totals, saturating at the `Decimal` bounds and never negative.
#[must_use]
pub fn subtotal<'a>(lines: impl IntoIterator<Item = &'a CartLineItem>) -> Decimal {
    lines
        .into_iter()
        .fold(Decimal::ZERO, |acc, line| acc.saturating_add(line.line_total()))
        .max(Decimal::ZERO)
}

/// Order payload handed to the external order-placement collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub store_id: StoreId,
    pub lines: Vec<CartLineItem>,
    pub subtotal: Decimal,
    pub item_count: u64,
}
