//! Checkout route handlers.
//!
//! Each request builds a fresh orchestrator over the customer's session.
//! Between the submit and the bank's answer the orchestrator only exists as
//! the pending payment in the session; the frame-message relay and the
//! callback route resume it from there.

use std::net::IpAddr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;
use vitrin_core::Order;

use crate::checkout::{
    CheckoutError, CheckoutForm, CheckoutOrchestrator, CheckoutServices, FrameMessage, SessionCartStore,
    SessionPendingStore,
};
use crate::db::{OrderRepository, StockRepository};
use crate::error::{AppError, Result, StockShortageBody, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::payment::{BuyerInfo, IyzicoClient};
use crate::state::AppState;

/// Fallback when no client address can be determined.
const UNKNOWN_CLIENT_IP: &str = "127.0.0.1";

/// Orchestrator over the database and the customer's session.
pub(crate) type SessionCheckout<'a> = CheckoutOrchestrator<
    'a,
    StockRepository<'a>,
    IyzicoClient,
    OrderRepository<'a>,
    SessionPendingStore,
    SessionCartStore,
>;

/// Per-request collaborators the orchestrator borrows.
pub(crate) struct SessionStores<'a> {
    stock: StockRepository<'a>,
    orders: OrderRepository<'a>,
    pending: SessionPendingStore,
    cart: SessionCartStore,
    gateway: &'a IyzicoClient,
}

impl<'a> SessionStores<'a> {
    pub(crate) fn new(state: &'a AppState, session: &Session) -> Self {
        Self {
            stock: StockRepository::new(state.pool()),
            orders: OrderRepository::new(state.pool()),
            pending: SessionPendingStore::new(session.clone()),
            cart: SessionCartStore::new(session.clone()),
            gateway: state.gateway(),
        }
    }

    pub(crate) const fn services(
        &self,
    ) -> CheckoutServices<
        '_,
        StockRepository<'a>,
        IyzicoClient,
        OrderRepository<'a>,
        SessionPendingStore,
        SessionCartStore,
    > {
        CheckoutServices {
            stock: &self.stock,
            gateway: self.gateway,
            orders: &self.orders,
            pending: &self.pending,
            cart: &self.cart,
        }
    }
}

/// Client address, preferring the proxy's `X-Forwarded-For`.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| ip.parse::<IpAddr>().is_ok())
        .map_or_else(|| UNKNOWN_CLIENT_IP.to_string(), String::from)
}

/// Itemized stock pre-check response.
#[derive(Debug, Serialize)]
pub struct StockCheckResponse {
    pub available: bool,
    pub shortages: Vec<StockShortageBody>,
}

/// Check the current cart against stock without starting a payment.
#[instrument(skip(state, session))]
pub async fn stock(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<StockCheckResponse>> {
    let stores = SessionStores::new(&state, &session);
    let orchestrator = SessionCheckout::new(stores.services(), state.checkout());
    let shortages = orchestrator.check_cart_stock().await?;

    Ok(Json(StockCheckResponse {
        available: shortages.is_empty(),
        shortages: shortages.iter().map(Into::into).collect(),
    }))
}

/// Authentication page hosting the bank's challenge in a frame.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/challenge.html")]
pub struct ChallengeTemplate {
    pub auth_document: String,
    pub bridge_origin: String,
    pub confirmation_delay_ms: u128,
}

/// Submit the checkout form and show the bank's challenge.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CheckoutForm>,
) -> Result<ChallengeTemplate> {
    let buyer = BuyerInfo {
        user_id: user.id,
        email: user.email.clone(),
        ip: client_ip(&headers),
    };

    let stores = SessionStores::new(&state, &session);
    let mut orchestrator = SessionCheckout::new(stores.services(), state.checkout());
    let challenge = orchestrator.submit(&buyer, &form).await?;

    add_breadcrumb(
        "checkout",
        "3-D Secure challenge shown",
        Some(&[("correlation_id", challenge.correlation_id.as_str())]),
    );

    Ok(ChallengeTemplate {
        auth_document: challenge.auth_document,
        bridge_origin: state.config().checkout.bridge_origin.clone(),
        confirmation_delay_ms: state.config().checkout.confirmation_delay.as_millis(),
    })
}

/// Dismiss the challenge and drop the pending payment.
#[instrument(skip(state, session))]
pub async fn cancel(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    let stores = SessionStores::new(&state, &session);
    let mut orchestrator = SessionCheckout::resume(stores.services(), state.checkout()).await?;
    orchestrator.cancel().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Outcome of a relayed frame message.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameMessageResponse {
    /// Not a message for the pending payment.
    Ignored,
    /// The order was created.
    Completed { order_id: i32, redirect: String },
}

impl From<&Order> for FrameMessageResponse {
    fn from(order: &Order) -> Self {
        Self::Completed {
            order_id: order.id.as_i32(),
            redirect: format!("/orders/{}", order.id),
        }
    }
}

/// Relay of the bridge's `PAYMENT_CALLBACK` message from the checkout page.
#[instrument(skip(state, session, message), fields(origin = %message.origin))]
pub async fn frame_message(
    State(state): State<AppState>,
    session: Session,
    Json(message): Json<FrameMessage>,
) -> Result<Json<FrameMessageResponse>> {
    let stores = SessionStores::new(&state, &session);
    let mut orchestrator = SessionCheckout::resume(stores.services(), state.checkout()).await?;
    if orchestrator.listener().is_none() {
        return Err(AppError::from(CheckoutError::PendingPaymentMissing));
    }

    let response = orchestrator
        .handle_frame_message(&message)
        .await?
        .as_ref()
        .map_or(FrameMessageResponse::Ignored, FrameMessageResponse::from);

    Ok(Json(response))
}
