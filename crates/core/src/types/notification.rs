//! Transient user-facing notifications raised by cart operations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a notification, driving its toast styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A message for the toast UI.
///
/// The slot holding it is single-valued; `raised_at` lets the UI decide when
/// the message has been shown long enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time.
    #[must_use]
    pub fn new(kind: NotificationKind, text: impl Into<String>) -> Self {
        Self::at(kind, text, Utc::now())
    }

    /// Create a notification with an explicit timestamp.
    #[must_use]
    pub fn at(kind: NotificationKind, text: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            text: text.into(),
            raised_at,
        }
    }

    /// Whether the display duration `ttl` has elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        chrono::Duration::from_std(ttl)
            .is_ok_and(|ttl| now.signed_duration_since(self.raised_at) >= ttl)
    }
}
