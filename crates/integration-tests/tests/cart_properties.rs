//! Property tests over random operation sequences.
//!
//! After every operation:
//! - `(store, id)` pairs are unique
//! - every quantity is at least 1 and within stock
//! - an operation on one store leaves every other store's lines untouched
//! - a store's subtotal equals the sum of its line totals

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::HashSet;

use proptest::prelude::*;
use rust_decimal::Decimal;
use tenant_cart::CartStore;
use tenant_cart_core::{CartLineItem, CatalogProduct, ProductId, StoreId};
use tenant_cart_integration_tests::memory_cart;

const STORES: [&str; 3] = ["s1", "s2", "s3"];
const PRODUCTS: [&str; 4] = ["p1", "p2", "p3", "p4"];

#[derive(Debug, Clone)]
enum Op {
    Add {
        store: usize,
        product: usize,
        quantity: u32,
        stock: Option<u32>,
    },
    Update {
        store: usize,
        product: usize,
        quantity: i64,
    },
    Remove {
        store: usize,
        product: usize,
    },
    ClearStore {
        store: usize,
    },
    Checkout {
        store: usize,
    },
}

impl Op {
    const fn store(&self) -> usize {
        match self {
            Self::Add { store, .. }
            | Self::Update { store, .. }
            | Self::Remove { store, .. }
            | Self::ClearStore { store }
            | Self::Checkout { store } => *store,
        }
    }
}

fn op() -> impl Strategy<Value = Op> {
    let store = 0..STORES.len();
    let product = 0..PRODUCTS.len();
    prop_oneof![
        4 => (store.clone(), product.clone(), 0u32..6, proptest::option::of(1u32..4)).prop_map(
            |(store, product, quantity, stock)| Op::Add { store, product, quantity, stock }
        ),
        2 => (store.clone(), product.clone(), -2i64..8).prop_map(|(store, product, quantity)| {
            Op::Update { store, product, quantity }
        }),
        1 => (store.clone(), product).prop_map(|(store, product)| Op::Remove { store, product }),
        1 => store.clone().prop_map(|store| Op::ClearStore { store }),
        1 => store.prop_map(|store| Op::Checkout { store }),
    ]
}

fn catalog(product: usize, stock: Option<u32>) -> CatalogProduct {
    CatalogProduct {
        id: ProductId::new(PRODUCTS[product]),
        name: None,
        image: None,
        price: Decimal::new(i64::try_from(product).unwrap() * 250 + 99, 2),
        stock,
    }
}

fn apply(cart: &CartStore, op: &Op) {
    let view = cart.for_store(STORES[op.store()]);
    match *op {
        Op::Add {
            product,
            quantity,
            stock,
            ..
        } => {
            view.add_item(&catalog(product, stock), quantity);
        }
        Op::Update {
            product, quantity, ..
        } => {
            view.update_quantity(&ProductId::new(PRODUCTS[product]), quantity);
        }
        Op::Remove { product, .. } => {
            view.remove_item(&ProductId::new(PRODUCTS[product]));
        }
        Op::ClearStore { .. } => {
            view.clear();
        }
        Op::Checkout { .. } => {
            view.complete_checkout();
        }
    }
}

fn lines_outside(items: &[CartLineItem], store: &StoreId) -> Vec<CartLineItem> {
    items
        .iter()
        .filter(|line| &line.store_id != store)
        .cloned()
        .collect()
}

proptest! {
    #[test]
    fn cart_invariants_hold(ops in proptest::collection::vec(op(), 1..40)) {
        let cart = memory_cart();

        for op in &ops {
            let store = StoreId::new(STORES[op.store()]);
            let others_before = lines_outside(&cart.items(), &store);

            apply(&cart, op);

            let items = cart.items();
            let mut seen = HashSet::new();
            for line in &items {
                prop_assert!(seen.insert((line.store_id.clone(), line.id.clone())));
                prop_assert!(line.quantity >= 1);
                if let Some(stock) = line.stock {
                    prop_assert!(line.quantity <= stock.max(1));
                }
            }

            prop_assert_eq!(lines_outside(&items, &store), others_before);

            for store in STORES {
                let view = cart.for_store(store);
                let expected: Decimal = view.items().iter().map(CartLineItem::line_total).sum();
                prop_assert_eq!(view.subtotal(), expected);
                prop_assert!(view.subtotal() >= Decimal::ZERO);
            }
        }
    }

    #[test]
    fn clear_cart_empties_every_store(ops in proptest::collection::vec(op(), 1..20)) {
        let cart = memory_cart();
        for op in &ops {
            apply(&cart, op);
        }

        cart.clear_cart();

        prop_assert!(cart.items().is_empty());
        for store in STORES {
            prop_assert_eq!(cart.for_store(store).total_count(), 0);
        }
    }
}
