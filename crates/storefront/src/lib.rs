//! Vitrin storefront library.
//!
//! Checkout with 3-D Secure payment orchestration: stock validation, the
//! payment gateway client, the pending payment kept across the bank's
//! redirect, order finalization, and the HTTP surface around them.

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::{Router, extract::Request};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod routes;
pub mod state;

use state::AppState;

/// Build the application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                }))
                .layer(axum::middleware::from_fn(middleware::request_id_middleware)),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
