//! Checkout scenario tests for the Vitrin storefront.
//!
//! The scenarios drive the checkout orchestrator end to end against
//! in-memory stock, gateway, order, pending-payment and cart stores, one
//! orchestrator per simulated request, the way the HTTP routes use it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vitrin-integration-tests
//! ```

use std::time::Duration;

use vitrin_core::{CartLine, Email, UserId};
use vitrin_storefront::checkout::test_support::{Gateway, Orders, Stock};
use vitrin_storefront::checkout::{
    CheckoutForm, CheckoutOrchestrator, CheckoutServices, CheckoutSettings, MemoryCartStore,
    MemoryPendingStore,
};
use vitrin_storefront::payment::{BuyerInfo, PaymentSettings};

pub use vitrin_storefront::checkout::test_support::line;

/// Origin the bridge page is served from in these scenarios.
pub const BRIDGE_ORIGIN: &str = "https://shop.example.com";

/// Orchestrator over the in-memory stores.
pub type TestCheckout<'a> =
    CheckoutOrchestrator<'a, Stock, Gateway, Orders, MemoryPendingStore, MemoryCartStore>;

/// One customer's checkout surroundings.
pub struct CheckoutWorld {
    pub stock: Stock,
    pub gateway: Gateway,
    pub orders: Orders,
    pub pending: MemoryPendingStore,
    pub cart: MemoryCartStore,
    pub settings: CheckoutSettings,
}

impl CheckoutWorld {
    /// A world whose gateway issues a challenge for conversation `c1`.
    #[must_use]
    pub fn new(stock: Stock, cart: Vec<CartLine>) -> Self {
        Self::with_gateway(stock, cart, Gateway::challenging("c1"))
    }

    #[must_use]
    pub fn with_gateway(stock: Stock, cart: Vec<CartLine>, gateway: Gateway) -> Self {
        Self {
            stock,
            gateway,
            orders: Orders::default(),
            pending: MemoryPendingStore::new(),
            cart: MemoryCartStore::with_lines(cart),
            settings: CheckoutSettings {
                payment: PaymentSettings::default(),
                callback_url: format!("{BRIDGE_ORIGIN}/payment/3ds-return"),
                bridge_origin: BRIDGE_ORIGIN.to_string(),
                verify_delay: Duration::ZERO,
                pending_ttl: Duration::from_secs(30 * 60),
            },
        }
    }

    #[must_use]
    pub const fn services(
        &self,
    ) -> CheckoutServices<'_, Stock, Gateway, Orders, MemoryPendingStore, MemoryCartStore> {
        CheckoutServices {
            stock: &self.stock,
            gateway: &self.gateway,
            orders: &self.orders,
            pending: &self.pending,
            cart: &self.cart,
        }
    }

    /// A fresh orchestrator, as on the checkout page.
    #[must_use]
    pub const fn checkout(&self) -> TestCheckout<'_> {
        CheckoutOrchestrator::new(self.services(), &self.settings)
    }
}

/// The signed-in buyer's details as the checkout route builds them.
#[must_use]
pub fn buyer(email: Email) -> BuyerInfo {
    BuyerInfo {
        user_id: UserId::new(7),
        email,
        ip: "85.34.78.112".to_string(),
    }
}

/// A complete, valid checkout form.
#[must_use]
pub fn form() -> CheckoutForm {
    CheckoutForm {
        label: "Home".to_string(),
        full_name: "Ada Lovelace".to_string(),
        phone: "0532 111 22 33".to_string(),
        address_line: "Moda Cd. 5".to_string(),
        city: "İstanbul".to_string(),
        district: "Kadıköy".to_string(),
        card_holder: "Ada Lovelace".to_string(),
        card_number: "5528 7900 0000 0008".to_string(),
        expiry: "12/30".to_string(),
        cvc: "123".to_string(),
        ..CheckoutForm::default()
    }
}
