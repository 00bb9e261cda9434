//! HTTP route handlers for the sync server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health          - Health check
//!
//! # Cart (bearer auth)
//! GET  /api/cart        - Current server cart
//! POST /api/cart/sync   - Merge or replace the server cart
//! ```

pub mod cart;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::show))
        .route("/cart/sync", post(cart::sync))
}

/// Liveness health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}
