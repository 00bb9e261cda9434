//! Login-time merge against the sync endpoint.

#![allow(clippy::print_stdout)]

use thiserror::Error;

use tenant_cart::{CartConfig, CartError, CartStore, SessionCredential, SyncCoordinator, SyncOutcome};

/// Errors from the sync command.
#[derive(Debug, Error)]
pub enum SyncCommandError {
    /// Sync is not configured or the HTTP client could not be built.
    #[error(transparent)]
    Setup(#[from] CartError),

    /// The merge request failed; the local cart is unchanged.
    #[error("Sync failed: {0}")]
    Failed(String),
}

/// Run one login transition for `subject` and report the outcome.
///
/// # Errors
///
/// Returns error if sync is not configured or the merge request failed.
pub async fn run(
    config: &CartConfig,
    cart: CartStore,
    subject: &str,
    token: String,
) -> Result<(), SyncCommandError> {
    let coordinator = SyncCoordinator::from_config(cart, config)?;
    let credential = SessionCredential::new(subject, token);

    match coordinator.on_authenticated(&credential).await {
        SyncOutcome::Merged {
            items,
            overwrote_local_changes,
        } => {
            println!("Merged cart for {subject}: {items} lines");
            if overwrote_local_changes {
                println!("Local changes made during the merge were replaced");
            }
            Ok(())
        }
        SyncOutcome::Skipped(reason) => {
            println!("Skipped: {reason:?}");
            Ok(())
        }
        SyncOutcome::Failed(message) => Err(SyncCommandError::Failed(message)),
        SyncOutcome::Discarded => {
            println!("Session ended before the merge completed");
            Ok(())
        }
    }
}
