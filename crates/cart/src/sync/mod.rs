//! Login-time reconciliation of the guest cart with the server cart.
//!
//! # Protocol
//!
//! 1. Snapshot the local lines (the guest cart) and the store revision.
//! 2. Send them to the sync endpoint with `merge: true`, a per-login
//!    `merge_id` and the baseline: the server cart of the last merge
//!    confirmed for the same subject, as persisted by the cart store.
//! 3. Replace the local lines wholesale with the merged list the server
//!    returns, and record it as the subject's new baseline.
//! 4. On failure leave the guest cart untouched, raise an error notification
//!    and allow the next trigger to retry with the same `merge_id`.
//!
//! The baseline lets an additive server count only what the guest added since
//! the last merge, so logging the same user in again, or merging from a fresh
//! process, does not double quantities.
//!
//! The one-shot guard is keyed on the authenticated subject: repeated triggers
//! for the same user after a confirmed merge are skipped, a different user
//! starts a fresh merge, and `on_logout` clears it. A logout also starts a new
//! session epoch; a response that arrives for an older epoch is discarded.
//!
//! Local mutations made while the request is in flight are overwritten by the
//! merge result. The outcome reports when that happened.

mod client;

pub use client::HttpCartSync;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use tenant_cart_core::{CartLineItem, CartSyncRequest, NotificationKind, SyncStatus};

use crate::config::{CartConfig, ConfigError};
use crate::store::CartStore;

/// Text of the notification raised when a merge fails.
pub const SYNC_FAILED: &str = "We couldn't sync your cart. We'll try again shortly.";

/// Errors that can occur when calling the sync endpoint.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed (connection, timeout, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session credential was rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the endpoint.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The endpoint returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The endpoint URL could not be built.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// A valid auth credential for the signed-in shopper.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    /// Stable identity of the user; keys the one-shot guard.
    pub subject: String,
    /// Bearer token presented to the sync endpoint.
    pub token: SecretString,
}

impl SessionCredential {
    #[must_use]
    pub fn new(subject: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            token: SecretString::from(token.into()),
        }
    }
}

/// The backend cart-sync endpoint.
#[async_trait]
pub trait CartSyncApi: Send + Sync {
    /// Send local lines and return the server's resulting cart.
    async fn sync_cart(
        &self,
        credential: &SessionCredential,
        request: &CartSyncRequest,
    ) -> Result<Vec<CartLineItem>, SyncError>;
}

/// Why a trigger did not start a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// This subject's merge was already confirmed in this session.
    AlreadySynced,
    /// A merge request is still in flight.
    InFlight,
}

/// Result of one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No request was made.
    Skipped(SkipReason),
    /// The server cart was merged and local state replaced.
    Merged {
        items: usize,
        /// Local mutations made during the request were overwritten.
        overwrote_local_changes: bool,
    },
    /// The request failed; the guest cart is unchanged.
    Failed(String),
    /// The session ended while the request was in flight; its result was
    /// dropped and the cart is unchanged.
    Discarded,
}

/// Releases the in-flight slot of one session epoch.
///
/// Dropped unsettled means the caller abandoned the request future, and the
/// status goes back to `Idle`.
struct InFlight<'a> {
    coordinator: &'a SyncCoordinator,
    epoch: u64,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = self.coordinator.guard.lock();
        if guard.in_flight != Some(self.epoch) {
            return;
        }
        guard.in_flight = None;
        if !self.settled {
            self.coordinator.status.send_replace(SyncStatus::Idle);
        }
    }
}

#[derive(Debug, Default)]
struct Guard {
    /// Subject whose merge was confirmed.
    completed_for: Option<String>,
    /// Idempotency key for the current, not yet confirmed, login transition.
    pending: Option<(String, Uuid)>,
    /// Epoch of the request currently awaiting a response.
    in_flight: Option<u64>,
    /// Bumped by every logout.
    epoch: u64,
}

/// Runs the merge protocol once per login transition.
pub struct SyncCoordinator {
    cart: CartStore,
    api: Arc<dyn CartSyncApi>,
    guard: Mutex<Guard>,
    status: watch::Sender<SyncStatus>,
}

impl SyncCoordinator {
    #[must_use]
    pub fn new(cart: CartStore, api: Arc<dyn CartSyncApi>) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            cart,
            api,
            guard: Mutex::new(Guard::default()),
            status,
        }
    }

    /// Build a coordinator talking to the endpoint named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Config` when no sync endpoint is configured and
    /// `CartError::Sync` when the HTTP client cannot be built.
    pub fn from_config(cart: CartStore, config: &CartConfig) -> crate::Result<Self> {
        let endpoint = config
            .sync
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("CART_SYNC_URL".to_string()))?;
        let api = HttpCartSync::new(endpoint)?;
        debug!(endpoint = %api.endpoint(), "Using sync endpoint");
        Ok(Self::new(cart, Arc::new(api)))
    }

    /// Current merge status.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    /// Observe status changes, e.g. to render a pending indicator.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Whether the merge for `subject` has been confirmed.
    #[must_use]
    pub fn is_synced_for(&self, subject: &str) -> bool {
        self.guard.lock().completed_for.as_deref() == Some(subject)
    }

    /// Trigger: a valid credential is available.
    ///
    /// Safe to call on every render; only the first call per subject (or the
    /// first after a failure) reaches the network.
    #[instrument(skip(self, credential), fields(subject = %credential.subject))]
    pub async fn on_authenticated(&self, credential: &SessionCredential) -> SyncOutcome {
        let (merge_id, epoch) = {
            let mut guard = self.guard.lock();
            if guard.completed_for.as_deref() == Some(credential.subject.as_str()) {
                return SyncOutcome::Skipped(SkipReason::AlreadySynced);
            }
            if guard.in_flight.is_some() {
                return SyncOutcome::Skipped(SkipReason::InFlight);
            }
            guard.in_flight = Some(guard.epoch);

            let merge_id = match &guard.pending {
                Some((subject, id)) if subject == &credential.subject => *id,
                _ => {
                    let id = Uuid::new_v4();
                    guard.pending = Some((credential.subject.clone(), id));
                    id
                }
            };
            self.status.send_replace(SyncStatus::Pending);
            (merge_id, guard.epoch)
        };
        let mut in_flight = InFlight {
            coordinator: self,
            epoch,
            settled: false,
        };

        let base_revision = self.cart.revision();
        let request = CartSyncRequest::merge(self.cart.items(), merge_id)
            .with_baseline(self.cart.sync_baseline(&credential.subject));
        let local_items = request.items.len();

        let response = self.api.sync_cart(credential, &request).await;

        let mut guard = self.guard.lock();
        in_flight.settled = true;
        if guard.epoch != epoch {
            drop(guard);
            info!(%merge_id, "Session ended during sync; discarding response");
            return SyncOutcome::Discarded;
        }
        guard.in_flight = None;

        match response {
            Ok(merged) => {
                let items = merged.len();
                let overwrote_local_changes =
                    self.cart.apply_merged(merged, base_revision, &credential.subject);
                guard.completed_for = Some(credential.subject.clone());
                guard.pending = None;
                self.status.send_replace(SyncStatus::Confirmed);
                drop(guard);

                if overwrote_local_changes {
                    warn!(
                        %merge_id,
                        "Local cart changes made during sync were replaced by the merged cart"
                    );
                }
                info!(%merge_id, local_items, merged_items = items, "Cart merged with server");

                SyncOutcome::Merged {
                    items,
                    overwrote_local_changes,
                }
            }
            Err(e) => {
                self.status.send_replace(SyncStatus::Failed);
                drop(guard);
                warn!(error = %e, %merge_id, "Cart sync failed; keeping guest cart");
                self.cart.notify(NotificationKind::Error, SYNC_FAILED);

                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Trigger: the credential went away. The next login merges again.
    ///
    /// A request still in flight is orphaned: its response will be discarded.
    pub fn on_logout(&self) {
        let mut guard = self.guard.lock();
        guard.completed_for = None;
        guard.pending = None;
        guard.in_flight = None;
        guard.epoch += 1;
        self.status.send_replace(SyncStatus::Idle);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use parking_lot::Mutex as SyncMutex;
    use rust_decimal::Decimal;
    use tenant_cart_core::{CartItemInput, MergePolicy, merge_since};
    use tokio::sync::Notify;

    use super::*;
    use crate::storage::MemoryStorage;

    /// In-process backend applying the additive union rule.
    #[derive(Default)]
    struct FakeBackend {
        server: SyncMutex<Vec<CartLineItem>>,
        requests: SyncMutex<Vec<CartSyncRequest>>,
        fail_next: SyncMutex<u32>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeBackend {
        fn with_server(items: Vec<CartLineItem>) -> Self {
            Self {
                server: SyncMutex::new(items),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl CartSyncApi for FakeBackend {
        async fn sync_cart(
            &self,
            _credential: &SessionCredential,
            request: &CartSyncRequest,
        ) -> Result<Vec<CartLineItem>, SyncError> {
            self.requests.lock().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            {
                let mut fail = self.fail_next.lock();
                if *fail > 0 {
                    *fail -= 1;
                    return Err(SyncError::Api {
                        status: 503,
                        message: "unavailable".to_string(),
                    });
                }
            }
            let mut server = self.server.lock();
            *server = merge_since(&server, &request.items, &request.baseline, MergePolicy::Sum);
            Ok(server.clone())
        }
    }

    fn line(id: &str, price: i64, quantity: u32) -> CartLineItem {
        CartLineItem::from_input(CartItemInput::new(id, "s1", Decimal::new(price, 0)), quantity)
    }

    fn cart() -> CartStore {
        CartStore::open(Arc::new(MemoryStorage::new()), "cart-storage").unwrap()
    }

    fn alice() -> SessionCredential {
        SessionCredential::new("alice", "token-a")
    }

    #[test]
    fn test_from_config_requires_sync_endpoint() {
        let config = CartConfig::from_lookup(|_| None).unwrap();
        let result = SyncCoordinator::from_config(cart(), &config);
        assert!(matches!(
            result,
            Err(crate::CartError::Config(ConfigError::MissingEnvVar(key))) if key == "CART_SYNC_URL"
        ));
    }

    #[test]
    fn test_from_config_with_endpoint() {
        let config = CartConfig::from_lookup(|key| {
            (key == "CART_SYNC_URL").then(|| "http://localhost:3100".to_string())
        })
        .unwrap();
        let coordinator = SyncCoordinator::from_config(cart(), &config).unwrap();
        assert_eq!(coordinator.status(), SyncStatus::Idle);
    }

    #[tokio::test]
    async fn test_login_merge_scenario() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 2)]);
        let backend = Arc::new(FakeBackend::with_server(vec![
            line("p1", 1000, 1),
            line("p2", 500, 1),
        ]));
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        let outcome = coordinator.on_authenticated(&alice()).await;
        assert_eq!(
            outcome,
            SyncOutcome::Merged {
                items: 2,
                overwrote_local_changes: false
            }
        );

        let items = cart.items();
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[1].quantity, 1);
        assert_eq!(cart.for_store("s1").subtotal(), Decimal::new(3500, 0));
        assert_eq!(coordinator.status(), SyncStatus::Confirmed);

        let requests = backend.requests.lock();
        assert!(requests[0].merge);
        assert!(requests[0].merge_id.is_some());
    }

    #[tokio::test]
    async fn test_second_trigger_is_skipped() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 2)]);
        let backend = Arc::new(FakeBackend::default());
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        coordinator.on_authenticated(&alice()).await;
        let again = coordinator.on_authenticated(&alice()).await;

        assert_eq!(again, SyncOutcome::Skipped(SkipReason::AlreadySynced));
        assert_eq!(backend.requests.lock().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_guest_cart_and_allows_retry() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 2)]);
        let backend = Arc::new(FakeBackend::with_server(vec![line("p2", 500, 1)]));
        *backend.fail_next.lock() = 1;
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        let outcome = coordinator.on_authenticated(&alice()).await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert_eq!(cart.items(), vec![line("p1", 1000, 2)]);
        assert_eq!(coordinator.status(), SyncStatus::Failed);
        assert!(!coordinator.is_synced_for("alice"));

        let note = cart.notification().unwrap();
        assert_eq!(note.kind, NotificationKind::Error);
        assert_eq!(note.text, SYNC_FAILED);

        let retry = coordinator.on_authenticated(&alice()).await;
        assert!(matches!(retry, SyncOutcome::Merged { items: 2, .. }));

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].merge_id, requests[1].merge_id);
    }

    #[tokio::test]
    async fn test_new_subject_and_logout_trigger_new_merge() {
        let cart = cart();
        let backend = Arc::new(FakeBackend::default());
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        coordinator.on_authenticated(&alice()).await;
        let bob = SessionCredential::new("bob", "token-b");
        assert!(matches!(
            coordinator.on_authenticated(&bob).await,
            SyncOutcome::Merged { .. }
        ));

        coordinator.on_logout();
        assert_eq!(coordinator.status(), SyncStatus::Idle);
        assert!(matches!(
            coordinator.on_authenticated(&bob).await,
            SyncOutcome::Merged { .. }
        ));

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 3);
        assert_ne!(requests[1].merge_id, requests[2].merge_id);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_skipped_and_race_reported() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 1)]);
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend {
            gate: Some(gate.clone()),
            ..FakeBackend::default()
        });
        let coordinator = Arc::new(SyncCoordinator::new(cart.clone(), backend));

        let first = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_authenticated(&alice()).await })
        };

        let mut status = coordinator.subscribe();
        status
            .wait_for(|s| *s == SyncStatus::Pending)
            .await
            .unwrap();

        assert_eq!(
            coordinator.on_authenticated(&alice()).await,
            SyncOutcome::Skipped(SkipReason::InFlight)
        );

        // Mutation while the request is outstanding.
        cart.add_item(CartItemInput::new("p9", "s1", Decimal::ONE), 1);
        gate.notify_one();

        let outcome = first.await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Merged {
                items: 1,
                overwrote_local_changes: true
            }
        );
        assert!(cart.for_store("s1").get(&"p9".into()).is_none());
    }

    #[tokio::test]
    async fn test_abandoned_request_does_not_block_retry() {
        let cart = cart();
        cart.set_items(vec![line("p1", 10, 1)]);
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend {
            gate: Some(gate.clone()),
            ..FakeBackend::default()
        });
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            coordinator.on_authenticated(&alice()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(coordinator.status(), SyncStatus::Idle);

        gate.notify_one();
        let outcome = coordinator.on_authenticated(&alice()).await;
        assert!(matches!(outcome, SyncOutcome::Merged { items: 1, .. }));

        let requests = backend.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].merge_id, requests[1].merge_id);
    }

    #[tokio::test]
    async fn test_relogin_and_fresh_coordinator_do_not_double_quantities() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 2)]);
        let backend = Arc::new(FakeBackend::default());
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        coordinator.on_authenticated(&alice()).await;
        assert_eq!(cart.items()[0].quantity, 2);

        coordinator.on_logout();
        coordinator.on_authenticated(&alice()).await;
        assert_eq!(cart.items()[0].quantity, 2);

        // A new process over the same persisted cart.
        let restarted = SyncCoordinator::new(cart.clone(), backend.clone());
        restarted.on_authenticated(&alice()).await;
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(backend.server.lock()[0].quantity, 2);

        let requests = backend.requests.lock();
        assert!(requests[0].baseline.is_empty());
        assert_eq!(requests[1].baseline, vec![line("p1", 1000, 2)]);
    }

    #[tokio::test]
    async fn test_guest_additions_after_logout_are_merged_once() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 2)]);
        let backend = Arc::new(FakeBackend::default());
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        coordinator.on_authenticated(&alice()).await;
        coordinator.on_logout();
        cart.add_item(CartItemInput::new("p1", "s1", Decimal::new(1000, 0)), 1);
        coordinator.on_authenticated(&alice()).await;

        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(backend.server.lock()[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_other_subject_gets_no_baseline() {
        let cart = cart();
        cart.set_items(vec![line("p1", 1000, 1)]);
        let backend = Arc::new(FakeBackend::default());
        let coordinator = SyncCoordinator::new(cart.clone(), backend.clone());

        coordinator.on_authenticated(&alice()).await;
        coordinator.on_logout();
        coordinator
            .on_authenticated(&SessionCredential::new("bob", "token-b"))
            .await;

        let requests = backend.requests.lock();
        assert!(requests[1].baseline.is_empty());
        assert_eq!(cart.sync_baseline("bob"), cart.items());
    }

    #[tokio::test]
    async fn test_logout_discards_in_flight_merge() {
        let cart = cart();
        cart.set_items(vec![line("p1", 10, 1)]);
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend {
            server: SyncMutex::new(vec![line("secret", 10, 5)]),
            gate: Some(gate.clone()),
            ..FakeBackend::default()
        });
        let coordinator = Arc::new(SyncCoordinator::new(cart.clone(), backend));

        let login = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_authenticated(&alice()).await })
        };
        coordinator
            .subscribe()
            .wait_for(|s| *s == SyncStatus::Pending)
            .await
            .unwrap();

        coordinator.on_logout();
        gate.notify_one();

        assert_eq!(login.await.unwrap(), SyncOutcome::Discarded);
        assert_eq!(coordinator.status(), SyncStatus::Idle);
        assert!(!coordinator.is_synced_for("alice"));
        assert_eq!(cart.items(), vec![line("p1", 10, 1)]);
        assert!(cart.sync_baseline("alice").is_empty());
        assert!(cart.notification().is_none());
    }

    #[tokio::test]
    async fn test_login_after_logout_is_not_blocked_by_orphaned_request() {
        let cart = cart();
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(FakeBackend {
            gate: Some(gate.clone()),
            ..FakeBackend::default()
        });
        let coordinator = Arc::new(SyncCoordinator::new(cart.clone(), backend));

        let orphaned = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.on_authenticated(&alice()).await })
        };
        coordinator
            .subscribe()
            .wait_for(|s| *s == SyncStatus::Pending)
            .await
            .unwrap();
        coordinator.on_logout();

        let bob = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .on_authenticated(&SessionCredential::new("bob", "token-b"))
                    .await
            })
        };
        coordinator
            .subscribe()
            .wait_for(|s| *s == SyncStatus::Pending)
            .await
            .unwrap();

        gate.notify_one();
        gate.notify_one();
        assert_eq!(orphaned.await.unwrap(), SyncOutcome::Discarded);
        assert!(matches!(bob.await.unwrap(), SyncOutcome::Merged { .. }));
        assert_eq!(coordinator.status(), SyncStatus::Confirmed);
        assert!(coordinator.is_synced_for("bob"));
    }
}
