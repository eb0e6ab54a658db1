//! Vitrin CLI - Database migrations and stock management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (including the session table)
//! vitrin-cli migrate
//!
//! # Set the stock counter for one product size
//! vitrin-cli stock set BG-1717171717171 M 5
//!
//! # Show all size counters for a product
//! vitrin-cli stock show BG-1717171717171
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `stock set` - Set the stock quantity for a product size
//! - `stock show` - List stock quantities for a product

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vitrin-cli")]
#[command(author, version, about = "Vitrin storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage per-size stock counters
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Set the quantity in stock for one product size
    Set {
        /// Catalog product id
        product_id: String,

        /// Size label (e.g. S, M, L)
        size: String,

        /// Units in stock
        quantity: u32,
    },
    /// Show stock for every size of a product
    Show {
        /// Catalog product id
        product_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Stock { action } => match action {
            StockAction::Set {
                product_id,
                size,
                quantity,
            } => commands::stock::set(&product_id, &size, quantity).await?,
            StockAction::Show { product_id } => commands::stock::show(&product_id).await?,
        },
    }
    Ok(())
}
