//! Cart API handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use tenant_cart_core::{CartSyncRequest, CartSyncResponse};

use crate::carts::SyncResult;
use crate::error::{AppError, Result};
use crate::middleware::BearerUser;
use crate::state::AppState;

/// Return the authenticated user's server cart.
#[instrument(skip(state), fields(user_id = %user))]
pub async fn show(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
) -> Json<CartSyncResponse> {
    Json(CartSyncResponse {
        items: state.carts().get(&user).await,
    })
}

/// Merge or replace the authenticated user's server cart.
#[instrument(skip(state, request), fields(user_id = %user))]
pub async fn sync(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
    Json(request): Json<CartSyncRequest>,
) -> Result<Json<CartSyncResponse>> {
    validate(&request)?;

    let items = match state.carts().sync(&user, request).await {
        SyncResult::Applied(items) => items,
        SyncResult::Replayed(items) => {
            tracing::info!("Replayed merge receipt");
            items
        }
    };

    Ok(Json(CartSyncResponse { items }))
}

/// Reject lines without an identity.
fn validate(request: &CartSyncRequest) -> Result<()> {
    if let Some(line) = request
        .items
        .iter()
        .find(|line| line.id.as_str().is_empty() || line.store_id.as_str().is_empty())
    {
        return Err(AppError::BadRequest(format!(
            "line '{}' in store '{}' has an empty id",
            line.id, line.store_id
        )));
    }
    Ok(())
}
