//! Stock validation and decrement.
//!
//! Availability is checked once per distinct (product, size) pair before the
//! gateway is contacted and again right before an order is minted. Decrement
//! runs only after the order rows are written and never blocks the order:
//! a failed decrement is logged with the payment reference for manual
//! reconciliation.

use std::future::Future;

use tracing::{error, instrument, warn};
use vitrin_core::{CartLine, ProductId};

use crate::db::RepositoryError;

/// Result of a non-mutating stock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLevel {
    /// Whether the requested quantity can be fulfilled.
    pub available: bool,
    /// Quantity currently on hand.
    pub stock_qty: i32,
}

/// Backend holding per-size inventory counters.
pub trait StockStore: Send + Sync {
    /// Read the stock for a product size and compare it with `requested`.
    fn check_availability(
        &self,
        product_id: &ProductId,
        size: &str,
        requested: u32,
    ) -> impl Future<Output = Result<StockLevel, RepositoryError>> + Send;

    /// Decrease stock by `quantity`. Returns `false` without mutating when
    /// fewer than `quantity` units remain.
    fn decrement(
        &self,
        product_id: &ProductId,
        size: &str,
        quantity: u32,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// A cart line (or group of lines) that cannot be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub title: String,
    pub size: String,
    pub requested: u32,
    pub available: i32,
}

impl std::fmt::Display for StockShortage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\" ({}) - {} in stock, {} in cart",
            self.title, self.size, self.available, self.requested
        )
    }
}

/// Identifies the payment a decrement belongs to, for reconciliation logs.
#[derive(Debug, Clone, Copy)]
pub struct PaymentReference<'a> {
    pub correlation_id: &'a str,
    pub payment_id: &'a str,
}

/// Outcome of a best-effort decrement of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecrementOutcome {
    Applied,
    /// Stock was lower than the sold quantity; nothing was changed.
    Insufficient,
    /// The backend could not be reached.
    Failed(String),
}

/// Stock checks and decrements over a [`StockStore`].
pub struct StockValidator<'a, S> {
    store: &'a S,
}

impl<'a, S: StockStore> StockValidator<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Check a single product size.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` when the backend cannot answer; callers must
    /// treat an unknown stock state as blocking.
    #[instrument(skip(self))]
    pub async fn check_availability(
        &self,
        product_id: &ProductId,
        size: &str,
        requested: u32,
    ) -> Result<StockLevel, RepositoryError> {
        self.store
            .check_availability(product_id, size, requested)
            .await
    }

    /// Check every sized line, one call per distinct (product, size).
    ///
    /// Lines sharing a product and size (e.g. two colors) are summed before
    /// checking. Lines without a size carry no per-size stock and are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; no partial result is produced.
    pub async fn check_lines(
        &self,
        lines: &[CartLine],
    ) -> Result<Vec<StockShortage>, RepositoryError> {
        let mut shortages = Vec::new();

        for group in group_by_size(lines) {
            let level = self
                .check_availability(&group.product_id, &group.size, group.requested)
                .await?;

            if !level.available {
                shortages.push(StockShortage {
                    product_id: group.product_id,
                    title: group.title,
                    size: group.size,
                    requested: group.requested,
                    available: level.stock_qty,
                });
            }
        }

        Ok(shortages)
    }

    /// Decrement one product size.
    pub async fn decrement(
        &self,
        product_id: &ProductId,
        size: &str,
        quantity: u32,
    ) -> DecrementOutcome {
        match self.store.decrement(product_id, size, quantity).await {
            Ok(true) => DecrementOutcome::Applied,
            Ok(false) => DecrementOutcome::Insufficient,
            Err(e) => DecrementOutcome::Failed(e.to_string()),
        }
    }

    /// Decrement stock for every sized line, logging but never failing.
    ///
    /// Returns the outcome per sized line, in cart order.
    pub async fn decrement_lines(
        &self,
        lines: &[CartLine],
        reference: PaymentReference<'_>,
    ) -> Vec<DecrementOutcome> {
        let mut outcomes = Vec::new();

        for line in lines {
            let Some(size) = line.size.as_deref() else {
                continue;
            };

            let outcome = self.decrement(&line.product_id, size, line.quantity).await;
            match &outcome {
                DecrementOutcome::Applied => {}
                DecrementOutcome::Insufficient => warn!(
                    correlation_id = %reference.correlation_id,
                    payment_id = %reference.payment_id,
                    product_id = %line.product_id,
                    size = %size,
                    quantity = line.quantity,
                    "Stock lower than sold quantity, decrement skipped"
                ),
                DecrementOutcome::Failed(reason) => error!(
                    correlation_id = %reference.correlation_id,
                    payment_id = %reference.payment_id,
                    product_id = %line.product_id,
                    size = %size,
                    quantity = line.quantity,
                    error = %reason,
                    "Stock decrement failed"
                ),
            }
            outcomes.push(outcome);
        }

        outcomes
    }
}

struct SizeGroup {
    product_id: ProductId,
    title: String,
    size: String,
    requested: u32,
}

fn group_by_size(lines: &[CartLine]) -> Vec<SizeGroup> {
    let mut groups: Vec<SizeGroup> = Vec::new();

    for line in lines {
        let Some(size) = line.size.as_deref() else {
            continue;
        };

        if let Some(group) = groups
            .iter_mut()
            .find(|g| g.product_id == line.product_id && g.size == size)
        {
            group.requested = group.requested.saturating_add(line.quantity);
        } else {
            groups.push(SizeGroup {
                product_id: line.product_id.clone(),
                title: line.title.clone(),
                size: size.to_owned(),
                requested: line.quantity,
            });
        }
    }

    groups
}
