//! Cart persistence for checkout.
//!
//! The cart is read when checkout is submitted (to snapshot it into the order
//! draft) and cleared once the order exists.

use std::future::Future;
use std::sync::Mutex;

use tower_sessions::Session;
use vitrin_core::{Cart, CartLine};

use super::CheckoutError;
use crate::models::keys;

/// Where the customer's cart lives.
pub trait CartStore: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Cart, CheckoutError>> + Send;

    fn save(&self, cart: &Cart) -> impl Future<Output = Result<(), CheckoutError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), CheckoutError>> + Send;
}

/// Cart held in the customer's session.
#[derive(Debug, Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStore for SessionCartStore {
    async fn load(&self) -> Result<Cart, CheckoutError> {
        let lines = self
            .session
            .get::<Vec<CartLine>>(keys::CART)
            .await
            .map_err(|e| CheckoutError::Storage(e.to_string()))?
            .unwrap_or_default();
        Ok(Cart::from_lines(lines))
    }

    async fn save(&self, cart: &Cart) -> Result<(), CheckoutError> {
        self.session
            .insert(keys::CART, cart.lines())
            .await
            .map_err(|e| CheckoutError::Storage(e.to_string()))
    }

    async fn clear(&self) -> Result<(), CheckoutError> {
        self.session
            .remove::<Vec<CartLine>>(keys::CART)
            .await
            .map(|_| ())
            .map_err(|e| CheckoutError::Storage(e.to_string()))
    }
}

/// In-process cart for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    cart: Mutex<Cart>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn with_lines(lines: Vec<CartLine>) -> Self {
        Self {
            cart: Mutex::new(Cart::from_lines(lines)),
        }
    }

    /// Current cart, without going through the async trait.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.cart.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CartStore for MemoryCartStore {
    async fn load(&self) -> Result<Cart, CheckoutError> {
        Ok(self.snapshot())
    }

    async fn save(&self, cart: &Cart) -> Result<(), CheckoutError> {
        let mut slot = self
            .cart
            .lock()
            .map_err(|e| CheckoutError::Storage(e.to_string()))?;
        *slot = cart.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), CheckoutError> {
        let mut slot = self
            .cart
            .lock()
            .map_err(|e| CheckoutError::Storage(e.to_string()))?;
        slot.clear();
        Ok(())
    }
}
