//! The process-wide cart state.
//!
//! `CartStore` is the single source of truth for every store's cart lines. It
//! is an explicit, cheaply cloneable container handed to each UI surface
//! rather than a global, so tests build their own and nothing leaks between
//! them.
//!
//! Every mutation is applied synchronously under one write lock, persisted
//! before the lock is released, and published as a new revision on a `watch`
//! channel. Two rapid calls are therefore applied in call order. A failed
//! persistence write is logged and swallowed: the in-memory mutation still
//! takes effect.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tenant_cart_core::{
    CartItemInput, CartLineItem, Notification, NotificationKind, ProductId, StoreId,
    fold_duplicates,
};

use crate::config::CartConfig;
use crate::error::add_breadcrumb;
use crate::notification::NotificationChannel;
use crate::projection::StoreCart;
use crate::storage::{CartStorage, FileStorage, PersistedCart, StorageError, SyncBaseline};

/// Default toast display duration.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Text of the notification raised by a successful add.
pub const ADDED_TO_CART: &str = "Added to cart";

/// What `add_item` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended with this quantity.
    Added { quantity: u32 },
    /// An existing line now has this quantity.
    Incremented { quantity: u32 },
    /// The request exceeded `stock`; the line was capped at it.
    Clamped { quantity: u32, stock: u32 },
    /// Zero quantity requested; nothing changed.
    Ignored,
}

/// Shared, cloneable handle to the cart state.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn CartStorage>,
    storage_key: String,
    state: RwLock<CartState>,
    revision: watch::Sender<u64>,
    open_carts: Mutex<HashSet<StoreId>>,
    notifications: NotificationChannel,
}

#[derive(Default)]
struct CartState {
    items: Vec<CartLineItem>,
    revision: u64,
    synced: Option<SyncBaseline>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("CartStore")
            .field("storage_key", &self.inner.storage_key)
            .field("items", &state.items.len())
            .field("revision", &state.revision)
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Open the cart persisted under `storage_key`, hydrating from storage.
    ///
    /// A missing, unreadable or unknown-version document yields an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the backend itself cannot be read.
    pub fn open(
        storage: Arc<dyn CartStorage>,
        storage_key: impl Into<String>,
    ) -> Result<Self, StorageError> {
        Self::open_with_ttl(storage, storage_key, DEFAULT_NOTIFICATION_TTL)
    }

    /// Like [`Self::open`] with an explicit notification display duration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the backend itself cannot be read.
    pub fn open_with_ttl(
        storage: Arc<dyn CartStorage>,
        storage_key: impl Into<String>,
        notification_ttl: Duration,
    ) -> Result<Self, StorageError> {
        let storage_key = storage_key.into();
        let (items, synced) = hydrate(storage.as_ref(), &storage_key)?;
        info!(
            key = %storage_key,
            items = items.len(),
            synced_for = synced.as_ref().map(|b| b.subject.as_str()),
            "Cart hydrated"
        );

        let (revision, _) = watch::channel(0);

        Ok(Self {
            inner: Arc::new(CartStoreInner {
                storage,
                storage_key,
                state: RwLock::new(CartState {
                    items,
                    revision: 0,
                    synced,
                }),
                revision,
                open_carts: Mutex::new(HashSet::new()),
                notifications: NotificationChannel::new(notification_ttl),
            }),
        })
    }

    /// Open the file-backed cart described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the storage directory cannot be read.
    pub fn from_config(config: &CartConfig) -> crate::Result<Self> {
        let storage = Arc::new(FileStorage::new(&config.storage_dir));
        Ok(Self::open_with_ttl(
            storage,
            config.storage_key.clone(),
            config.notification_ttl,
        )?)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Snapshot of every line, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.inner.state.read().items.clone()
    }

    /// Run `f` against the current lines without cloning them.
    pub fn with_items<R>(&self, f: impl FnOnce(&[CartLineItem]) -> R) -> R {
        f(&self.inner.state.read().items)
    }

    /// Monotonic counter bumped by every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.state.read().revision
    }

    /// Observe the revision; UI surfaces re-render when it changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Server lines of the last merge confirmed for `subject`.
    ///
    /// Empty when no merge was confirmed or it was for another subject.
    #[must_use]
    pub fn sync_baseline(&self, subject: &str) -> Vec<CartLineItem> {
        match &self.inner.state.read().synced {
            Some(baseline) if baseline.subject == subject => baseline.items.clone(),
            _ => Vec::new(),
        }
    }

    /// Key the cart is persisted under.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.inner.storage_key
    }

    /// A view scoped to one store.
    #[must_use]
    pub fn for_store(&self, store_id: impl Into<StoreId>) -> StoreCart {
        StoreCart::new(self.clone(), store_id.into())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// The result is capped at the product's stock when known. A zero quantity
    /// is ignored.
    pub fn add_item(&self, input: CartItemInput, quantity: u32) -> AddOutcome {
        if quantity == 0 {
            debug!(store_id = %input.store_id, product_id = %input.id, "Ignoring add of zero quantity");
            return AddOutcome::Ignored;
        }

        let store_id = input.store_id.clone();
        let product_id = input.id.clone();
        let display_name = input.name.clone();

        let outcome = self.write(|items| {
            match items.iter_mut().find(|line| line.is(&input.store_id, &input.id)) {
                Some(line) => {
                    let before = (line.quantity, line.stock);
                    if input.stock.is_some() {
                        line.stock = input.stock;
                    }
                    let requested = u64::from(line.quantity) + u64::from(quantity);
                    line.quantity = line.clamp_quantity(requested);
                    let outcome = clamp_outcome(line, requested)
                        .unwrap_or(AddOutcome::Incremented { quantity: line.quantity });
                    (outcome, before != (line.quantity, line.stock))
                }
                None => {
                    let line = CartLineItem::from_input(input, quantity);
                    let outcome = clamp_outcome(&line, u64::from(quantity))
                        .unwrap_or(AddOutcome::Added { quantity: line.quantity });
                    items.push(line);
                    (outcome, true)
                }
            }
        });

        debug!(%store_id, %product_id, ?outcome, "Cart line added");
        add_breadcrumb(
            "cart",
            "Added item",
            Some(&[("store_id", store_id.as_str()), ("product_id", product_id.as_str())]),
        );

        match outcome {
            AddOutcome::Clamped { stock, .. } => {
                let what = display_name.unwrap_or_else(|| "this item".to_string());
                self.notify(
                    NotificationKind::Error,
                    format!("Only {stock} of {what} available"),
                );
            }
            AddOutcome::Added { .. } | AddOutcome::Incremented { .. } => {
                self.notify(NotificationKind::Success, ADDED_TO_CART);
            }
            AddOutcome::Ignored => {}
        }

        outcome
    }

    /// Remove a line. Returns whether one was present.
    pub fn remove_item(&self, id: &ProductId, store_id: &StoreId) -> bool {
        let removed = self.write(|items| {
            let before = items.len();
            items.retain(|line| !line.is(store_id, id));
            let removed = items.len() != before;
            (removed, removed)
        });

        if removed {
            debug!(%store_id, product_id = %id, "Cart line removed");
            add_breadcrumb(
                "cart",
                "Removed item",
                Some(&[("store_id", store_id.as_str()), ("product_id", id.as_str())]),
            );
        }
        removed
    }

    /// Set a line's quantity, clamped to stock.
    ///
    /// A quantity below 1 removes the line. Returns the resulting quantity, or
    /// `None` if the line is absent afterwards.
    pub fn update_quantity(
        &self,
        id: &ProductId,
        new_quantity: i64,
        store_id: &StoreId,
    ) -> Option<u32> {
        let Ok(requested) = u64::try_from(new_quantity) else {
            self.remove_item(id, store_id);
            return None;
        };
        if requested == 0 {
            self.remove_item(id, store_id);
            return None;
        }

        let quantity = self.write(|items| {
            match items.iter_mut().find(|line| line.is(store_id, id)) {
                Some(line) => {
                    let clamped = line.clamp_quantity(requested);
                    let changed = clamped != line.quantity;
                    line.quantity = clamped;
                    (Some(clamped), changed)
                }
                None => (None, false),
            }
        });

        debug!(%store_id, product_id = %id, requested, ?quantity, "Cart quantity updated");
        quantity
    }

    /// Remove every line of every store.
    pub fn clear_cart(&self) -> usize {
        let removed = self.write(|items| {
            let removed = items.len();
            items.clear();
            (removed, removed > 0)
        });
        info!(removed, "Cart cleared");
        add_breadcrumb("cart", "Cleared cart", None);
        removed
    }

    /// Remove only the lines belonging to `store_id`.
    pub fn clear_store_cart(&self, store_id: &StoreId) -> usize {
        let removed = self.write(|items| {
            let before = items.len();
            items.retain(|line| &line.store_id != store_id);
            let removed = before - items.len();
            (removed, removed > 0)
        });
        info!(%store_id, removed, "Store cart cleared");
        add_breadcrumb(
            "cart",
            "Cleared store cart",
            Some(&[("store_id", store_id.as_str())]),
        );
        removed
    }

    /// Replace every line wholesale.
    ///
    /// Duplicate `(store_id, id)` lines are folded together and zero
    /// quantities dropped, so the cart invariants hold whatever the source.
    pub fn set_items(&self, items: Vec<CartLineItem>) {
        let items = fold_duplicates(items);
        let count = items.len();
        self.write(move |current| {
            *current = items;
            ((), true)
        });
        info!(items = count, "Cart replaced");
    }

    /// Replace the cart with the merge result confirmed for `subject`,
    /// reporting whether local changes made since `base_revision` were
    /// overwritten.
    ///
    /// The result is also recorded as the subject's sync baseline.
    pub(crate) fn apply_merged(
        &self,
        items: Vec<CartLineItem>,
        base_revision: u64,
        subject: &str,
    ) -> bool {
        let items = fold_duplicates(items);
        let mut state = self.inner.state.write();
        let overwrote = state.revision != base_revision;
        state.synced = Some(SyncBaseline {
            subject: subject.to_string(),
            items: items.clone(),
        });
        state.items = items;
        self.commit(&mut state);
        overwrote
    }

    /// Re-read the cart from storage, e.g. after another process wrote it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read; the in-memory
    /// cart is left unchanged.
    pub fn reload_from_storage(&self) -> Result<(), StorageError> {
        let (items, synced) = hydrate(self.inner.storage.as_ref(), &self.inner.storage_key)?;
        let mut state = self.inner.state.write();
        state.items = items;
        state.synced = synced;
        state.revision += 1;
        self.inner.revision.send_replace(state.revision);
        drop(state);
        debug!("Cart reloaded from storage");
        Ok(())
    }

    /// Wipe items, UI flags, notification and the persisted document.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset(&self) {
        let mut state = self.inner.state.write();
        state.items.clear();
        state.synced = None;
        state.revision += 1;
        self.inner.revision.send_replace(state.revision);
        drop(state);

        self.inner.open_carts.lock().clear();
        self.inner.notifications.clear();
        if let Err(e) = self.inner.storage.remove(&self.inner.storage_key) {
            warn!(error = %e, "Failed to remove persisted cart during reset");
        }
    }

    // =========================================================================
    // Transient UI flags
    // =========================================================================

    /// Whether the cart drawer for `store_id` is open.
    #[must_use]
    pub fn is_open(&self, store_id: &StoreId) -> bool {
        self.inner.open_carts.lock().contains(store_id)
    }

    /// Flip the drawer flag for `store_id`, returning the new state.
    pub fn toggle_open(&self, store_id: &StoreId) -> bool {
        let mut open = self.inner.open_carts.lock();
        if open.remove(store_id) {
            false
        } else {
            open.insert(store_id.clone());
            true
        }
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Publish a toast message, replacing any current one.
    pub fn notify(&self, kind: NotificationKind, text: impl Into<String>) {
        self.inner.notifications.notify(kind, text);
    }

    /// Dismiss the current toast message.
    pub fn clear_notification(&self) {
        self.inner.notifications.clear();
    }

    /// The current toast message, expired or not.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        self.inner.notifications.current()
    }

    /// The notification slot itself, for subscribing and expiry checks.
    #[must_use]
    pub fn notifications(&self) -> &NotificationChannel {
        &self.inner.notifications
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply `f` under the write lock; when it reports a change, bump the
    /// revision and persist before releasing the lock.
    fn write<R>(&self, f: impl FnOnce(&mut Vec<CartLineItem>) -> (R, bool)) -> R {
        let mut state = self.inner.state.write();
        let (result, changed) = f(&mut state.items);
        if changed {
            self.commit(&mut state);
        }
        result
    }

    fn commit(&self, state: &mut CartState) {
        state.revision += 1;
        self.persist(state);
        self.inner.revision.send_replace(state.revision);
    }

    fn persist(&self, state: &CartState) {
        let result = PersistedCart::encode(&state.items, state.synced.as_ref())
            .and_then(|raw| self.inner.storage.save(&self.inner.storage_key, &raw));
        if let Err(e) = result {
            warn!(
                error = %e,
                key = %self.inner.storage_key,
                "Failed to persist cart; keeping in-memory state"
            );
        }
    }
}

/// Load and normalise the persisted lines and sync baseline under `key`.
fn hydrate(
    storage: &dyn CartStorage,
    key: &str,
) -> Result<(Vec<CartLineItem>, Option<SyncBaseline>), StorageError> {
    Ok(storage
        .load(key)?
        .and_then(|raw| PersistedCart::decode(&raw))
        .map(|doc| (fold_duplicates(doc.items), doc.synced))
        .unwrap_or_default())
}

/// `Clamped` if `requested` ran past the line's stock.
fn clamp_outcome(line: &CartLineItem, requested: u64) -> Option<AddOutcome> {
    match line.stock {
        Some(stock) if line.exceeds_stock(requested) => Some(AddOutcome::Clamped {
            quantity: line.quantity,
            stock,
        }),
        _ => None,
    }
}
