//! Bearer token authentication.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use tenant_cart_core::UserId;

use crate::error::set_sentry_user;
use crate::state::AppState;

/// Extractor that requires a known bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(BearerUser(user): BearerUser) -> impl IntoResponse {
///     format!("Hello, {user}!")
/// }
/// ```
pub struct BearerUser(pub UserId);

/// Error returned when the request is not authenticated.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization: Bearer` header.
    MissingToken,
    /// The token is not in the configured table.
    InvalidToken,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::MissingToken => "missing bearer token",
            Self::InvalidToken => "invalid bearer token",
        };
        (
            StatusCode::UNAUTHORIZED,
            [("www-authenticate", "Bearer")],
            message,
        )
            .into_response()
    }
}

/// The token of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for BearerUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;
        let user = state
            .config()
            .tokens
            .user_for(token)
            .cloned()
            .ok_or_else(|| {
                tracing::warn!(path = %parts.uri.path(), "Rejected unknown bearer token");
                AuthRejection::InvalidToken
            })?;

        set_sentry_user(&user);
        Ok(Self(user))
    }
}
