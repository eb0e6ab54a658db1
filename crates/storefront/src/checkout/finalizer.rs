//! Order finalization.
//!
//! The only place an order is minted. A commit is idempotent per gateway
//! payment id: a second call for a payment that already has an order returns
//! that order untouched.

use std::future::Future;

use tracing::{error, info, instrument};
use vitrin_core::{NewOrder, NewOrderItem, Order, OrderDraft};

use super::CheckoutError;
use super::stock::{DecrementOutcome, PaymentReference, StockStore, StockValidator};
use crate::db::RepositoryError;

/// Backend holding orders.
pub trait OrderStore: Send + Sync {
    fn find_by_payment_id(
        &self,
        payment_id: &str,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// Write the order row and its items. Either all rows are written or none.
    fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

pub struct OrderFinalizer<'a, S, O> {
    stock: StockValidator<'a, S>,
    orders: &'a O,
}

impl<'a, S: StockStore, O: OrderStore> OrderFinalizer<'a, S, O> {
    #[must_use]
    pub const fn new(stock: &'a S, orders: &'a O) -> Self {
        Self {
            stock: StockValidator::new(stock),
            orders,
        }
    }

    /// Turn a verified payment into an order.
    ///
    /// Re-checks stock, writes the order with its items, then decrements
    /// stock line by line. Decrement failures are logged and do not undo the
    /// order, because the payment has already been captured.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InsufficientStock` if stock no longer covers
    /// the cart; no order is created in that case.
    /// Returns `CheckoutError::Repository` if the stock check or order write fails.
    #[instrument(skip(self, draft), fields(order_id))]
    pub async fn finalize(
        &self,
        draft: &OrderDraft,
        correlation_id: &str,
        payment_id: &str,
    ) -> Result<Order, CheckoutError> {
        if let Some(existing) = self.orders.find_by_payment_id(payment_id).await? {
            info!(
                order_id = %existing.id,
                correlation_id,
                payment_id,
                "Order already exists for payment"
            );
            tracing::Span::current().record("order_id", existing.id.as_i32());
            return Ok(existing);
        }

        let shortages = self.stock.check_lines(&draft.cart).await?;
        if !shortages.is_empty() {
            return Err(CheckoutError::InsufficientStock(shortages));
        }

        let created = self
            .orders
            .create_order(
                &draft.to_new_order(payment_id, correlation_id),
                &draft.to_new_items(),
            )
            .await;

        let order = match created {
            Ok(order) => order,
            // Another delivery of the same callback committed first.
            Err(RepositoryError::Conflict(_)) => {
                if let Some(existing) = self.orders.find_by_payment_id(payment_id).await? {
                    info!(
                        order_id = %existing.id,
                        correlation_id,
                        payment_id,
                        "Order committed concurrently for payment"
                    );
                    tracing::Span::current().record("order_id", existing.id.as_i32());
                    return Ok(existing);
                }
                error!(
                    correlation_id,
                    payment_id, "Order conflict reported but no order found for payment"
                );
                return Err(RepositoryError::Conflict(
                    "payment already has an order".to_owned(),
                )
                .into());
            }
            Err(e) => {
                error!(
                    correlation_id,
                    payment_id,
                    error = %e,
                    "Order write failed after payment was captured"
                );
                return Err(e.into());
            }
        };
        tracing::Span::current().record("order_id", order.id.as_i32());

        let outcomes = self
            .stock
            .decrement_lines(
                &draft.cart,
                PaymentReference {
                    correlation_id,
                    payment_id,
                },
            )
            .await;
        let failed = outcomes
            .iter()
            .filter(|o| **o != DecrementOutcome::Applied)
            .count();

        info!(
            order_id = %order.id,
            correlation_id,
            payment_id,
            items = draft.cart.len(),
            failed_decrements = failed,
            "Order created"
        );

        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use vitrin_core::{ShippingAddress, UserId};

    use super::*;
    use crate::checkout::test_support::{Orders, Stock, line};

    /// Order store that loses the insert race once: the first lookup misses,
    /// then the insert hits the unique constraint because another request
    /// committed the same payment in between.
    #[derive(Default)]
    struct RacingOrders {
        committed: Orders,
        lookups: Mutex<usize>,
    }

    impl OrderStore for RacingOrders {
        async fn find_by_payment_id(
            &self,
            payment_id: &str,
        ) -> Result<Option<Order>, RepositoryError> {
            let first = {
                let mut lookups = self.lookups.lock().unwrap();
                *lookups += 1;
                *lookups == 1
            };
            if first {
                return Ok(None);
            }
            self.committed.find_by_payment_id(payment_id).await
        }

        async fn create_order(
            &self,
            order: &NewOrder,
            items: &[NewOrderItem],
        ) -> Result<Order, RepositoryError> {
            self.committed.create_order(order, items).await?;
            Err(RepositoryError::Conflict(
                "payment already has an order".to_owned(),
            ))
        }
    }

    fn draft() -> OrderDraft {
        OrderDraft::new(
            UserId::new(1),
            vec![line("BG-1", "M", 2)],
            ShippingAddress::default(),
        )
    }

    #[tokio::test]
    async fn test_finalize_creates_order_and_decrements_stock() {
        let stock = Stock::with("BG-1", "M", 5);
        let orders = Orders::default();

        let order = OrderFinalizer::new(&stock, &orders)
            .finalize(&draft(), "c1", "p1")
            .await
            .unwrap();

        assert_eq!(order.payment_id, "p1");
        assert_eq!(orders.count(), 1);
        assert_eq!(orders.item_count(), 1);
        assert_eq!(stock.get("BG-1", "M"), 3);
    }

    #[tokio::test]
    async fn test_finalize_returns_existing_order_for_same_payment() {
        let stock = Stock::with("BG-1", "M", 5);
        let orders = Orders::default();
        let finalizer = OrderFinalizer::new(&stock, &orders);

        let first = finalizer.finalize(&draft(), "c1", "p1").await.unwrap();
        let second = finalizer.finalize(&draft(), "c1", "p1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(orders.count(), 1);
        assert_eq!(stock.get("BG-1", "M"), 3);
    }

    #[tokio::test]
    async fn test_concurrent_commit_conflict_returns_existing_order() {
        let stock = Stock::with("BG-1", "M", 5);
        let orders = RacingOrders::default();

        let order = OrderFinalizer::new(&stock, &orders)
            .finalize(&draft(), "c1", "p1")
            .await
            .unwrap();

        assert_eq!(order.payment_id, "p1");
        assert_eq!(orders.committed.count(), 1);
        // The winning request owns the decrement.
        assert_eq!(stock.get("BG-1", "M"), 5);
    }

    #[tokio::test]
    async fn test_finalize_refuses_when_stock_ran_out() {
        let stock = Stock::with("BG-1", "M", 1);
        let orders = Orders::default();

        let err = OrderFinalizer::new(&stock, &orders)
            .finalize(&draft(), "c1", "p1")
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InsufficientStock(_)));
        assert_eq!(orders.count(), 0);
    }
}
