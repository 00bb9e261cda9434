//! Tenant Cart sync server.
//!
//! Reference implementation of the cart-sync endpoint the client engine calls
//! after a shopper signs in. Carts live in memory, keyed by the user a bearer
//! token maps to.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration and the bearer token table
//! - [`carts`] - Server carts and merge receipts
//! - [`routes`] - HTTP handlers
//! - [`middleware`] - Request id and bearer authentication

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod carts;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};

pub use carts::{CartRepository, SyncResult};
pub use config::{ConfigError, ServerConfig, TokenTable};
pub use error::AppError;
pub use state::AppState;

/// Build the router with its full middleware stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", routes::api_routes())
        .layer(axum_middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", response.status().as_u16());
                        span.record("latency_ms", latency.as_millis() as u64);
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
