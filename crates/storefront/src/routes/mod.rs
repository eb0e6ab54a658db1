//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Liveness
//! GET  /health/ready            - Readiness (database)
//!
//! # Cart (session)
//! GET  /cart                    - Cart JSON
//! POST /cart/add                - Add line (merges same product/size/color)
//! POST /cart/update             - Update quantity (0 removes)
//! POST /cart/remove             - Remove line
//!
//! # Checkout (requires auth for submit)
//! GET  /checkout/stock          - Itemized stock pre-check
//! POST /checkout                - Submit form, returns the 3-D Secure page
//! POST /checkout/cancel         - Dismiss authentication
//! POST /checkout/frame-message  - Relay of the bridge's frame message
//!
//! # Bank redirect
//! GET|POST /payment/3ds-return  - Redirect bridge
//! GET  /payment-callback        - Verify and finalize
//!
//! # Orders (requires auth)
//! GET  /orders/{id}             - Order confirmation
//! ```

pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod payment;

use axum::{
    Router,
    routing::{get, post},
};

use crate::config::{BRIDGE_PATH, PAYMENT_CALLBACK_PATH};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::submit))
        .route("/stock", get(checkout::stock))
        .route("/cancel", post(checkout::cancel))
        .route("/frame-message", post(checkout::frame_message))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route(BRIDGE_PATH, get(payment::bridge).post(payment::bridge))
        .route(PAYMENT_CALLBACK_PATH, get(payment::callback))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
}
