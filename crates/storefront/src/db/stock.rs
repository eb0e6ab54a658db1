//! Database operations for per-size product stock.
//!
//! Queries use the runtime `sqlx::query` API; the decrement is a single
//! conditional `UPDATE` so concurrent checkouts can never drive stock below
//! zero.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use vitrin_core::ProductId;

use super::{RepositoryError, quantity_to_db};
use crate::checkout::{StockLevel, StockStore};

/// A stock row as listed by the CLI.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub size: String,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// Repository for stock database operations.
pub struct StockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepository<'a> {
    /// Create a new stock repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current quantity for a product size. A missing row counts as zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn quantity(&self, product_id: &ProductId, size: &str) -> Result<i32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            r"
            SELECT quantity
            FROM storefront.product_size_stock
            WHERE product_id = $1 AND size = $2
            ",
        )
        .bind(product_id)
        .bind(size)
        .fetch_optional(self.pool)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    /// Set the absolute quantity for a product size, creating the row if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidInput` if the quantity does not fit the column.
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<StockRecord, RepositoryError> {
        let quantity = quantity_to_db(quantity)?;

        let record = sqlx::query_as::<_, StockRecord>(
            r"
            INSERT INTO storefront.product_size_stock (product_id, size, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, size)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            RETURNING product_id, size, quantity, updated_at
            ",
        )
        .bind(product_id)
        .bind(size)
        .bind(quantity)
        .fetch_one(self.pool)
        .await?;

        Ok(record)
    }

    /// List all size rows for a product, ordered by size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn list_for_product(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<StockRecord>, RepositoryError> {
        let records = sqlx::query_as::<_, StockRecord>(
            r"
            SELECT product_id, size, quantity, updated_at
            FROM storefront.product_size_stock
            WHERE product_id = $1
            ORDER BY size
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Decrease the quantity only if enough units remain.
    ///
    /// Returns `false` (and leaves the row untouched) when the row is missing
    /// or holds fewer than `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn decrement_if_available(
        &self,
        product_id: &ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let quantity = quantity_to_db(quantity)?;

        let result = sqlx::query(
            r"
            UPDATE storefront.product_size_stock
            SET quantity = quantity - $3, updated_at = NOW()
            WHERE product_id = $1 AND size = $2 AND quantity >= $3
            ",
        )
        .bind(product_id)
        .bind(size)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

impl StockStore for StockRepository<'_> {
    async fn check_availability(
        &self,
        product_id: &ProductId,
        size: &str,
        requested: u32,
    ) -> Result<StockLevel, RepositoryError> {
        let stock_qty = self.quantity(product_id, size).await?;
        Ok(StockLevel {
            available: i64::from(stock_qty) >= i64::from(requested),
            stock_qty,
        })
    }

    async fn decrement(
        &self,
        product_id: &ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        self.decrement_if_available(product_id, size, quantity).await
    }
}
