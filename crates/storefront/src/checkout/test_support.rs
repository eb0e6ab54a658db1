//! In-memory collaborators for checkout tests.
//!
//! Compiled for unit tests and, with the `test-support` feature, for the
//! integration-tests crate.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use vitrin_core::{CartLine, NewOrder, NewOrderItem, Order, OrderId, ProductId};

use super::{OrderStore, StockLevel, StockStore};
use crate::db::RepositoryError;
use crate::payment::types::{AuthRequest, InitializeRequest, InitializeResponse};
use crate::payment::{PaymentError, PaymentGateway};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stock counters keyed by product and size.
#[derive(Default)]
pub struct Stock {
    levels: Mutex<HashMap<(String, String), i32>>,
}

impl Stock {
    pub fn with(product: &str, size: &str, quantity: i32) -> Self {
        let stock = Self::default();
        stock.set(product, size, quantity);
        stock
    }

    pub fn set(&self, product: &str, size: &str, quantity: i32) {
        locked(&self.levels).insert((product.to_string(), size.to_string()), quantity);
    }

    pub fn get(&self, product: &str, size: &str) -> i32 {
        locked(&self.levels)
            .get(&(product.to_string(), size.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl StockStore for Stock {
    async fn check_availability(
        &self,
        product_id: &ProductId,
        size: &str,
        requested: u32,
    ) -> Result<StockLevel, RepositoryError> {
        let stock_qty = self.get(product_id.as_str(), size);
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
        let current = self.get(product_id.as_str(), size);
        let Ok(quantity) = i32::try_from(quantity) else {
            return Ok(false);
        };
        if current < quantity {
            return Ok(false);
        }
        self.set(product_id.as_str(), size, current - quantity);
        Ok(true)
    }
}

/// Gateway returning canned responses and recording every request.
pub struct Gateway {
    pub init_response: InitializeResponse,
    pub auth_response: Value,
    pub init_calls: Mutex<Vec<InitializeRequest>>,
    pub auth_calls: Mutex<Vec<AuthRequest>>,
}

impl Gateway {
    pub fn challenging(correlation_id: &str) -> Self {
        Self {
            init_response: InitializeResponse {
                status: "success".to_string(),
                conversation_id: Some(correlation_id.to_string()),
                three_ds_html_content: Some("<html><body>bank</body></html>".to_string()),
                ..InitializeResponse::default()
            },
            auth_response: json!({"status": "success"}),
            init_calls: Mutex::new(Vec::new()),
            auth_calls: Mutex::new(Vec::new()),
        }
    }

    /// A gateway that declines the initialize call.
    pub fn declining(error_message: &str) -> Self {
        Self {
            init_response: InitializeResponse {
                status: "failure".to_string(),
                error_message: Some(error_message.to_string()),
                ..InitializeResponse::default()
            },
            ..Self::challenging("unused")
        }
    }

    pub fn init_count(&self) -> usize {
        locked(&self.init_calls).len()
    }

    pub fn auth_count(&self) -> usize {
        locked(&self.auth_calls).len()
    }

    pub fn last_auth(&self) -> Option<AuthRequest> {
        locked(&self.auth_calls).last().cloned()
    }
}

impl PaymentGateway for Gateway {
    async fn initialize_3ds(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializeResponse, PaymentError> {
        locked(&self.init_calls).push(request.clone());
        Ok(self.init_response.clone())
    }

    async fn auth_3ds(&self, request: &AuthRequest) -> Result<Value, PaymentError> {
        locked(&self.auth_calls).push(request.clone());
        Ok(self.auth_response.clone())
    }
}

/// Order store keeping rows in memory.
#[derive(Default)]
pub struct Orders {
    pub orders: Mutex<Vec<Order>>,
    pub items: Mutex<Vec<(OrderId, NewOrderItem)>>,
}

impl Orders {
    pub fn count(&self) -> usize {
        locked(&self.orders).len()
    }

    pub fn item_count(&self) -> usize {
        locked(&self.items).len()
    }
}

impl OrderStore for Orders {
    async fn find_by_payment_id(&self, payment_id: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(locked(&self.orders)
            .iter()
            .find(|o| o.payment_id == payment_id)
            .cloned())
    }

    async fn create_order(
        &self,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut orders = locked(&self.orders);
        let id = OrderId::new(i32::try_from(orders.len() + 1).unwrap_or(i32::MAX));
        let created = Order {
            id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            shipping_address: order.shipping_address.clone(),
            payment_id: order.payment_id.clone(),
            conversation_id: order.conversation_id.clone(),
            created_at: Utc::now(),
        };
        orders.push(created.clone());
        locked(&self.items).extend(items.iter().cloned().map(|item| (id, item)));
        Ok(created)
    }
}

/// A sized cart line priced at 500.00.
pub fn line(product: &str, size: &str, quantity: u32) -> CartLine {
    CartLine {
        product_id: ProductId::new(product),
        title: "Linen Shirt".to_string(),
        unit_price: Decimal::new(50_000, 2),
        image_url: None,
        color: None,
        size: Some(size.to_string()),
        quantity,
    }
}
