//! Tenant Cart CLI - inspect, edit and sync the durable local cart.
//!
//! # Usage
//!
//! ```bash
//! # Add two units of a product to store s1
//! cart-cli add -s s1 -p p1 --price 10.00 -q 2 --name "Blue Mug"
//!
//! # Show every store's lines, or one store's
//! cart-cli list
//! cart-cli list -s s1
//!
//! # Merge the guest cart into the signed-in user's server cart
//! CART_SYNC_URL=http://127.0.0.1:3100 cart-cli sync --subject alice --token "$TOKEN"
//! ```
//!
//! # Commands
//!
//! - `add` / `remove` / `set` - Edit one store's lines
//! - `list` - Print lines, subtotals and counts
//! - `clear` - Empty one store's cart, or all of them
//! - `checkout` - Print the order payload and empty that store's cart
//! - `sync` - Run the login-time merge against the sync endpoint

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Tenant Cart command-line driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a product to a store's cart
    Add {
        /// Store the product belongs to
        #[arg(short, long)]
        store: String,

        /// Product id
        #[arg(short, long)]
        product: String,

        /// Unit price
        #[arg(long)]
        price: Decimal,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Image URL
        #[arg(long)]
        image: Option<String>,

        /// Available stock
        #[arg(long)]
        stock: Option<u32>,
    },
    /// Remove a line from a store's cart
    Remove {
        #[arg(short, long)]
        store: String,

        #[arg(short, long)]
        product: String,
    },
    /// Set a line's quantity; 0 or less removes it
    Set {
        #[arg(short, long)]
        store: String,

        #[arg(short, long)]
        product: String,

        #[arg(short, long, allow_hyphen_values = true)]
        quantity: i64,
    },
    /// List cart lines
    List {
        /// Only this store
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Clear one store's cart, or every store's
    Clear {
        #[arg(short, long)]
        store: Option<String>,
    },
    /// Print the order payload for a store and empty its cart
    Checkout {
        #[arg(short, long)]
        store: String,
    },
    /// Merge the local cart into the signed-in user's server cart
    Sync {
        /// Stable user identity
        #[arg(long, env = "CART_SYNC_SUBJECT")]
        subject: String,

        /// Bearer token for the sync endpoint
        #[arg(long, env = "CART_SYNC_TOKEN", hide_env_values = true)]
        token: String,
    },
}

#[tokio::main]
async fn main() {
    tenant_cart::telemetry::init_tracing("tenant_cart=info,tenant_cart_cli=info");

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = tenant_cart::CartConfig::from_env()?;
    let _sentry_guard = tenant_cart::telemetry::init_sentry(&config);

    let cart = tenant_cart::CartStore::from_config(&config)?;

    match cli.command {
        Commands::Add {
            store,
            product,
            price,
            quantity,
            name,
            image,
            stock,
        } => {
            let mut input = tenant_cart_core::CartItemInput::new(product, store, price);
            if let Some(name) = name {
                input = input.with_name(name);
            }
            if let Some(image) = image {
                input = input.with_image(image);
            }
            if let Some(stock) = stock {
                input = input.with_stock(stock);
            }
            commands::cart::add(&cart, input, quantity);
        }
        Commands::Remove { store, product } => commands::cart::remove(&cart, &store, &product),
        Commands::Set {
            store,
            product,
            quantity,
        } => commands::cart::set(&cart, &store, &product, quantity),
        Commands::List { store } => commands::cart::list(&cart, store.as_deref()),
        Commands::Clear { store } => commands::cart::clear(&cart, store.as_deref()),
        Commands::Checkout { store } => commands::cart::checkout(&cart, &store)?,
        Commands::Sync { subject, token } => {
            commands::sync::run(&config, cart, &subject, token).await?;
        }
    }
    Ok(())
}
