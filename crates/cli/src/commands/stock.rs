//! Stock management commands.
//!
//! Stock is counted per product and size. Checkout only validates and
//! decrements these counters, so seeding them happens here.
//!
//! # Usage
//!
//! ```bash
//! vitrin-cli stock set BG-1717171717171 M 5
//! vitrin-cli stock show BG-1717171717171
//! ```

use thiserror::Error;
use vitrin_core::ProductId;
use vitrin_storefront::db::{RepositoryError, StockRepository};

use super::{DatabaseSetupError, connect};

/// Errors that can occur during stock operations.
#[derive(Debug, Error)]
pub enum StockError {
    #[error(transparent)]
    Setup(#[from] DatabaseSetupError),

    #[error("Stock update failed: {0}")]
    Repository(#[from] RepositoryError),

    /// Size label is blank.
    #[error("Size must not be empty")]
    EmptySize,
}

/// Set the quantity in stock for one product size.
///
/// # Errors
///
/// Returns an error if the size is blank or the database update fails.
pub async fn set(product_id: &str, size: &str, quantity: u32) -> Result<(), StockError> {
    let size = size.trim();
    if size.is_empty() {
        return Err(StockError::EmptySize);
    }

    let pool = connect().await?;
    let record = StockRepository::new(&pool)
        .set_quantity(&ProductId::new(product_id), size, quantity)
        .await?;

    tracing::info!(
        product_id = %record.product_id,
        size = %record.size,
        quantity = record.quantity,
        "Stock updated"
    );

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{} ({}): {} in stock",
            record.product_id, record.size, record.quantity
        );
    }

    Ok(())
}

/// Show stock for every size of a product.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn show(product_id: &str) -> Result<(), StockError> {
    let pool = connect().await?;
    let product_id = ProductId::new(product_id);
    let records = StockRepository::new(&pool)
        .list_for_product(&product_id)
        .await?;

    #[allow(clippy::print_stdout)]
    {
        if records.is_empty() {
            println!("No stock rows for {product_id}");
        }
        for record in &records {
            println!(
                "{:<8} {:>6}  (updated {})",
                record.size,
                record.quantity,
                record.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    Ok(())
}
