//! Tenant Cart Core - Shared types library.
//!
//! This crate provides common types used across all Tenant Cart components:
//! - `cart` - The client-side multi-store cart engine
//! - `server` - Reference implementation of the cart-sync endpoint
//! - `cli` - Command-line driver for the cart engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no storage
//! access, no HTTP clients. This keeps it lightweight and allows both sides of
//! the sync protocol to agree on one definition of a cart line.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, cart lines, notifications, sync status
//! - [`merge`] - The union rule applied when a guest cart meets a server cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod merge;
pub mod types;

pub use merge::{
    MergePolicy, ParseMergePolicyError, fold_duplicates, guest_delta, merge_carts, merge_since,
};
pub use types::*;
