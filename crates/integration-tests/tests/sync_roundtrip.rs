//! Engine against the real sync server on a loopback port.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use rust_decimal::Decimal;
use tenant_cart::{
    CartStore, CartSyncApi, FileStorage, HttpCartSync, SessionCredential, SkipReason,
    SyncCoordinator, SyncOutcome,
};
use tenant_cart_core::{
    CartItemInput, CartLineItem, CartSyncRequest, CartSyncResponse, MergePolicy, NotificationKind,
    SyncStatus, UserId,
};
use tenant_cart_integration_tests::{
    ALICE_TOKEN, BOB_TOKEN, STORAGE_KEY, TestServer, memory_cart, product,
};
use uuid::Uuid;

fn line(store: &str, id: &str, price: i64, qty: u32) -> CartLineItem {
    CartLineItem::from_input(CartItemInput::new(id, store, Decimal::new(price, 0)), qty)
}

async fn seed(server: &TestServer, user: &str, items: Vec<CartLineItem>) {
    server
        .state
        .carts()
        .sync(
            &UserId::new(user),
            CartSyncRequest::replace(items),
        )
        .await;
}

// =============================================================================
// Login-time merge
// =============================================================================

#[tokio::test]
async fn test_guest_cart_merges_into_server_cart() {
    let server = TestServer::start(MergePolicy::Sum).await;
    seed(
        &server,
        "alice",
        vec![line("s1", "p1", 1000, 1), line("s1", "p2", 500, 1)],
    )
    .await;

    let cart = memory_cart();
    let s1 = cart.for_store("s1");
    s1.add_item(&product("p1", 1000), 2);
    assert_eq!(s1.subtotal(), Decimal::new(2000, 0));

    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let coordinator = SyncCoordinator::new(cart.clone(), Arc::new(api));
    let credential = SessionCredential::new("alice", ALICE_TOKEN);

    let outcome = coordinator.on_authenticated(&credential).await;
    assert_eq!(
        outcome,
        SyncOutcome::Merged {
            items: 2,
            overwrote_local_changes: false,
        }
    );
    assert_eq!(coordinator.status(), SyncStatus::Confirmed);
    assert_eq!(s1.subtotal(), Decimal::new(3500, 0));
    assert_eq!(s1.get(&"p1".into()).unwrap().quantity, 3);
    assert_eq!(s1.get(&"p2".into()).unwrap().quantity, 1);

    // Re-renders keep firing the trigger; none of them reach the server.
    assert_eq!(
        coordinator.on_authenticated(&credential).await,
        SyncOutcome::Skipped(SkipReason::AlreadySynced)
    );
    assert_eq!(s1.subtotal(), Decimal::new(3500, 0));

    let stored = server.state.carts().get(&UserId::new("alice")).await;
    assert_eq!(stored, cart.items());
}

#[tokio::test]
async fn test_merge_keeps_other_stores_separate() {
    let server = TestServer::start(MergePolicy::Sum).await;
    seed(&server, "alice", vec![line("s2", "p1", 40, 1)]).await;

    let cart = memory_cart();
    cart.for_store("s1").add_item(&product("p1", 10), 2);

    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let coordinator = SyncCoordinator::new(cart.clone(), Arc::new(api));
    coordinator
        .on_authenticated(&SessionCredential::new("alice", ALICE_TOKEN))
        .await;

    assert_eq!(cart.for_store("s1").get(&"p1".into()).unwrap().quantity, 2);
    assert_eq!(cart.for_store("s2").get(&"p1".into()).unwrap().quantity, 1);
    assert_eq!(cart.for_store("s2").subtotal(), Decimal::new(40, 0));
}

#[tokio::test]
async fn test_retried_merge_id_is_applied_once() {
    let server = TestServer::start(MergePolicy::Sum).await;
    seed(&server, "alice", vec![line("s1", "p1", 1000, 1)]).await;

    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let credential = SessionCredential::new("alice", ALICE_TOKEN);
    let request = CartSyncRequest::merge(vec![line("s1", "p1", 1000, 2)], Uuid::new_v4());

    // The first response is "lost"; the client retries with the same key.
    let first = api.sync_cart(&credential, &request).await.unwrap();
    let retry = api.sync_cart(&credential, &request).await.unwrap();

    assert_eq!(first, retry);
    assert_eq!(retry[0].quantity, 3);
}

#[tokio::test]
async fn test_logout_then_new_user_merges_again() {
    let server = TestServer::start(MergePolicy::Max).await;

    let cart = memory_cart();
    cart.for_store("s1").add_item(&product("p1", 10), 1);

    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let coordinator = SyncCoordinator::new(cart.clone(), Arc::new(api));

    coordinator
        .on_authenticated(&SessionCredential::new("alice", ALICE_TOKEN))
        .await;
    assert!(coordinator.is_synced_for("alice"));

    coordinator.on_logout();
    assert_eq!(coordinator.status(), SyncStatus::Idle);

    let outcome = coordinator
        .on_authenticated(&SessionCredential::new("bob", BOB_TOKEN))
        .await;
    assert!(matches!(outcome, SyncOutcome::Merged { .. }));
    assert!(coordinator.is_synced_for("bob"));
    assert_eq!(
        server.state.carts().get(&UserId::new("bob")).await.len(),
        1
    );
}

#[tokio::test]
async fn test_sum_relogin_as_same_user_does_not_double() {
    let server = TestServer::start(MergePolicy::Sum).await;

    let cart = memory_cart();
    cart.for_store("s1").add_item(&product("p1", 10), 2);

    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let coordinator = SyncCoordinator::new(cart.clone(), Arc::new(api));
    let alice = SessionCredential::new("alice", ALICE_TOKEN);

    for _ in 0..3 {
        let outcome = coordinator.on_authenticated(&alice).await;
        assert!(matches!(outcome, SyncOutcome::Merged { .. }), "{outcome:?}");
        assert_eq!(cart.items()[0].quantity, 2);
        coordinator.on_logout();
    }

    let stored = server.state.carts().get(&UserId::new("alice")).await;
    assert_eq!(stored[0].quantity, 2);
}

#[tokio::test]
async fn test_sum_merge_after_reload_does_not_double() {
    let server = TestServer::start(MergePolicy::Sum).await;
    let dir = tempfile::tempdir().unwrap();
    let alice = SessionCredential::new("alice", ALICE_TOKEN);

    {
        let cart = CartStore::open(Arc::new(FileStorage::new(dir.path())), STORAGE_KEY).unwrap();
        cart.for_store("s1").add_item(&product("p1", 10), 2);
        let api = HttpCartSync::new(&server.endpoint()).unwrap();
        SyncCoordinator::new(cart, Arc::new(api))
            .on_authenticated(&alice)
            .await;
    }

    // Same persisted cart, fresh process state.
    let cart = CartStore::open(Arc::new(FileStorage::new(dir.path())), STORAGE_KEY).unwrap();
    cart.for_store("s1").add_item(&product("p2", 5), 1);
    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let outcome = SyncCoordinator::new(cart.clone(), Arc::new(api))
        .on_authenticated(&alice)
        .await;

    assert!(matches!(outcome, SyncOutcome::Merged { items: 2, .. }), "{outcome:?}");
    let stored = server.state.carts().get(&UserId::new("alice")).await;
    assert_eq!(stored[0].quantity, 2);
    assert_eq!(stored[1].quantity, 1);
    assert_eq!(cart.items(), stored);
}

#[tokio::test]
async fn test_rejected_token_keeps_guest_cart() {
    let server = TestServer::start(MergePolicy::Sum).await;

    let cart = memory_cart();
    cart.for_store("s1").add_item(&product("p1", 10), 2);
    let before = cart.items();

    let api = HttpCartSync::new(&server.endpoint()).unwrap();
    let coordinator = SyncCoordinator::new(cart.clone(), Arc::new(api));
    let outcome = coordinator
        .on_authenticated(&SessionCredential::new("alice", "tok_wrong_0123456789"))
        .await;

    assert!(matches!(outcome, SyncOutcome::Failed(_)));
    assert_eq!(coordinator.status(), SyncStatus::Failed);
    assert_eq!(cart.items(), before);
    assert_eq!(cart.notification().unwrap().kind, NotificationKind::Error);
}

// =============================================================================
// Raw endpoint
// =============================================================================

#[tokio::test]
async fn test_get_cart_over_http() {
    let server = TestServer::start(MergePolicy::Sum).await;
    seed(&server, "bob", vec![line("s1", "p9", 7, 4)]).await;

    let response = reqwest::Client::new()
        .get(server.base_url().join("api/cart").unwrap())
        .bearer_auth(BOB_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: CartSyncResponse = response.json().await.unwrap();
    assert_eq!(body.items.len(), 1);
    assert_eq!(body.items[0].quantity, 4);
    assert_eq!(body.items[0].line_total(), Decimal::new(28, 0));
}
