//! Checkout and 3-D Secure payment orchestration.
//!
//! The flow is driven by [`CheckoutOrchestrator`]:
//!
//! ```text
//! Idle -> ValidatingStock -> AwaitingGatewayInit -> AwaitingAuthentication
//!      -> Verifying -> Finalizing -> Success | Failed
//! ```
//!
//! State that must survive the bank redirect (the pending payment and the
//! cart) lives behind the [`PendingPaymentStore`] and [`CartStore`] traits;
//! the HTTP layer backs them with the customer's session. Inventory and
//! orders are reached through [`StockStore`] and [`OrderStore`], which the
//! database repositories implement.

pub mod bridge;
pub mod cart;
pub mod error;
pub mod finalizer;
pub mod orchestrator;
pub mod pending;
pub mod stock;

pub use bridge::{CallbackParams, FrameMessage, MessageListener, PAYMENT_CALLBACK_TYPE};
pub use cart::{CartStore, MemoryCartStore, SessionCartStore};
pub use error::CheckoutError;
pub use finalizer::{OrderFinalizer, OrderStore};
pub use orchestrator::{
    CheckoutForm, CheckoutOrchestrator, CheckoutServices, CheckoutSettings, CheckoutState,
};
pub use pending::{MemoryPendingStore, PendingPayment, PendingPaymentStore, SessionPendingStore};
pub use stock::{
    DecrementOutcome, PaymentReference, StockLevel, StockShortage, StockStore, StockValidator,
};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
