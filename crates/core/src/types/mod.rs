//! Core types for Tenant Cart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod line_item;
pub mod notification;
pub mod status;
pub mod wire;

pub use id::*;
pub use line_item::{CartItemInput, CartLineItem, CatalogProduct, OrderRequest, subtotal};
pub use notification::{Notification, NotificationKind};
pub use status::SyncStatus;
pub use wire::{CartSyncRequest, CartSyncResponse};
