//! Status enums for cart synchronisation.

use serde::{Deserialize, Serialize};

/// Progress of the login-time cart merge.
///
/// UI surfaces render `Pending` distinctly instead of assuming the merge
/// already succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No merge attempted for the current session.
    #[default]
    Idle,
    /// A merge request is in flight.
    Pending,
    /// The server accepted the merge and local state was replaced.
    Confirmed,
    /// The last attempt failed; the guest cart is untouched and retryable.
    Failed,
}

impl SyncStatus {
    /// Whether a new merge may start from this state.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }
}
