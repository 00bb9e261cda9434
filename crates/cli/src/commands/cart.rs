//! Local cart editing commands.
//!
//! Output goes to stdout; logs go to stderr.

#![allow(clippy::print_stdout)]

use rust_decimal::Decimal;
use thiserror::Error;

use tenant_cart::{AddOutcome, CartStore, StoreCart};
use tenant_cart_core::{CartItemInput, CartLineItem, ProductId, StoreId};

/// Errors from cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Nothing to check out.
    #[error("Cart for store {0} is empty")]
    EmptyCart(String),

    /// The order payload could not be rendered.
    #[error("Failed to render order: {0}")]
    Render(#[from] serde_json::Error),
}

pub fn add(cart: &CartStore, input: CartItemInput, quantity: u32) {
    let store_id = input.store_id.clone();
    let id = input.id.clone();
    match cart.add_item(input, quantity) {
        AddOutcome::Added { quantity } => println!("Added {id} x{quantity} to {store_id}"),
        AddOutcome::Incremented { quantity } => {
            println!("{id} in {store_id} now x{quantity}");
        }
        AddOutcome::Clamped { quantity, stock } => {
            println!("{id} in {store_id} limited to x{quantity} (stock {stock})");
        }
        AddOutcome::Ignored => println!("Nothing added"),
    }
}

pub fn remove(cart: &CartStore, store: &str, product: &str) {
    if cart.remove_item(&ProductId::new(product), &StoreId::new(store)) {
        println!("Removed {product} from {store}");
    } else {
        println!("{product} is not in {store}'s cart");
    }
}

pub fn set(cart: &CartStore, store: &str, product: &str, quantity: i64) {
    match cart.update_quantity(&ProductId::new(product), quantity, &StoreId::new(store)) {
        Some(quantity) => println!("{product} in {store} now x{quantity}"),
        None => println!("{product} is not in {store}'s cart"),
    }
}

pub fn list(cart: &CartStore, store: Option<&str>) {
    let stores: Vec<StoreId> = match store {
        Some(store) => vec![StoreId::new(store)],
        None => cart.with_items(|items| {
            let mut stores: Vec<StoreId> = Vec::new();
            for line in items {
                if !stores.contains(&line.store_id) {
                    stores.push(line.store_id.clone());
                }
            }
            stores
        }),
    };

    if stores.is_empty() {
        println!("Cart is empty");
        return;
    }

    for store_id in stores {
        print_store(&cart.for_store(store_id));
    }
}

fn print_store(view: &StoreCart) {
    println!("[{}]", view.store_id());
    for line in view.items() {
        println!("  {}", describe(&line));
    }
    println!(
        "  subtotal {:.2} ({} items)",
        view.subtotal().round_dp(2),
        view.total_count()
    );
}

fn describe(line: &CartLineItem) -> String {
    let name = line.name.as_deref().unwrap_or_else(|| line.id.as_str());
    let total: Decimal = line.line_total().round_dp(2);
    match line.stock {
        Some(stock) => format!(
            "{name} x{} @ {:.2} = {total:.2} (stock {stock})",
            line.quantity, line.price
        ),
        None => format!("{name} x{} @ {:.2} = {total:.2}", line.quantity, line.price),
    }
}

pub fn clear(cart: &CartStore, store: Option<&str>) {
    let removed = match store {
        Some(store) => cart.clear_store_cart(&StoreId::new(store)),
        None => cart.clear_cart(),
    };
    println!("Removed {removed} lines");
}

/// Print the order payload as JSON, then empty the store's cart.
///
/// # Errors
///
/// Returns error if the store's cart is empty.
pub fn checkout(cart: &CartStore, store: &str) -> Result<(), CartCommandError> {
    let view = cart.for_store(store);
    let order = view
        .order_request()
        .ok_or_else(|| CartCommandError::EmptyCart(store.to_string()))?;

    println!("{}", serde_json::to_string_pretty(&order)?);
    view.complete_checkout();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tenant_cart::MemoryStorage;

    use super::*;

    fn cart() -> CartStore {
        CartStore::open(Arc::new(MemoryStorage::new()), "cart-storage").unwrap()
    }

    #[test]
    fn test_describe_line() {
        let line = CartLineItem::from_input(
            CartItemInput::new("p1", "s1", Decimal::new(1050, 2))
                .with_name("Blue Mug")
                .with_stock(4),
            2,
        );
        assert_eq!(describe(&line), "Blue Mug x2 @ 10.50 = 21.00 (stock 4)");
    }

    #[test]
    fn test_checkout_empties_only_that_store() {
        let cart = cart();
        add(&cart, CartItemInput::new("p1", "s1", Decimal::ONE), 1);
        add(&cart, CartItemInput::new("p1", "s2", Decimal::ONE), 1);

        checkout(&cart, "s1").unwrap();

        assert!(cart.for_store("s1").is_empty());
        assert_eq!(cart.for_store("s2").total_count(), 1);
    }

    #[test]
    fn test_checkout_empty_store_fails() {
        let cart = cart();
        assert!(matches!(
            checkout(&cart, "s1"),
            Err(CartCommandError::EmptyCart(_))
        ));
    }
}
