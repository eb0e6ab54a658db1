//! Database operations for storefront `PostgreSQL`.
//!
//! # Database: `vitrin_storefront`
//!
//! ## Tables (schema `storefront`)
//!
//! - `product_size_stock` - Available quantity per product and size
//! - `order` - Orders minted by checkout (one per verified payment)
//! - `order_item` - One row per purchased cart line
//! - `tower_sessions.session` - Tower-sessions storage (holds the cart and the
//!   pending payment between the gateway redirect hops)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p vitrin-cli -- migrate
//! ```

pub mod orders;
pub mod stock;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::OrderRepository;
pub use stock::StockRepository;

/// Errors returned by repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate payment id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A value cannot be represented in the database.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Convert a quantity to the `INTEGER` column type.
pub(crate) fn quantity_to_db(quantity: u32) -> Result<i32, RepositoryError> {
    i32::try_from(quantity)
        .map_err(|_| RepositoryError::InvalidInput(format!("quantity {quantity} out of range")))
}

/// Convert an `INTEGER` quantity column back to `u32`.
pub(crate) fn quantity_from_db(quantity: i32) -> Result<u32, RepositoryError> {
    u32::try_from(quantity).map_err(|_| {
        RepositoryError::DataCorruption(format!("negative quantity in database: {quantity}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_conversions() {
        assert_eq!(quantity_to_db(3).ok(), Some(3));
        assert!(matches!(
            quantity_to_db(u32::MAX),
            Err(RepositoryError::InvalidInput(_))
        ));
        assert_eq!(quantity_from_db(5).ok(), Some(5));
        assert!(matches!(
            quantity_from_db(-1),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
