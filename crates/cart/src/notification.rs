//! Single-slot notification channel.
//!
//! Any cart operation may publish; the toast UI observes the slot through a
//! `watch` receiver. A new notification replaces the previous one whether or
//! not it had expired. Scheduling the auto-clear is the UI's job: it compares
//! `raised_at` against the configured display duration via [`NotificationChannel::active`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use tenant_cart_core::{Notification, NotificationKind};

/// Holds at most one active notification.
#[derive(Debug)]
pub struct NotificationChannel {
    slot: watch::Sender<Option<Notification>>,
    ttl: Duration,
}

impl NotificationChannel {
    /// Create an empty channel whose messages are shown for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot, ttl }
    }

    /// Display duration applied by [`Self::active`].
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Publish a notification, preempting any current one.
    pub fn notify(&self, kind: NotificationKind, text: impl Into<String>) {
        self.publish(Notification::new(kind, text));
    }

    /// Publish a pre-built notification.
    pub fn publish(&self, notification: Notification) {
        tracing::debug!(kind = ?notification.kind, text = %notification.text, "Notification raised");
        self.slot.send_replace(Some(notification));
    }

    /// Dismiss the current notification.
    pub fn clear(&self) {
        self.slot.send_replace(None);
    }

    /// The slot's content, expired or not.
    #[must_use]
    pub fn current(&self) -> Option<Notification> {
        self.slot.borrow().clone()
    }

    /// The slot's content if it is still within its display duration at `now`.
    #[must_use]
    pub fn active(&self, now: DateTime<Utc>) -> Option<Notification> {
        self.slot
            .borrow()
            .as_ref()
            .filter(|n| !n.is_expired(now, self.ttl))
            .cloned()
    }

    /// Observe changes to the slot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.slot.subscribe()
    }
}
