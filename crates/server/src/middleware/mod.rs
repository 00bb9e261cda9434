//! HTTP middleware for the sync server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//!
//! Authentication is an extractor, applied per handler.

pub mod auth;
pub mod request_id;

pub use auth::{AuthRejection, BearerUser};
pub use request_id::request_id_middleware;
