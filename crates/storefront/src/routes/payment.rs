//! Routes the bank's 3-D Secure redirect lands on.
//!
//! The bank posts its result to the bridge (`/payment/3ds-return`), usually
//! inside the authentication frame. The bridge hands the parameters to the
//! checkout page and, as a fallback, redirects the top window to the
//! callback route (`/payment-callback`), which verifies and finalizes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tower_sessions::Session;
use tracing::instrument;
use vitrin_core::Order;

use super::checkout::{SessionCheckout, SessionStores};
use crate::checkout::{CallbackParams, PAYMENT_CALLBACK_TYPE};
use crate::error::AppError;
use crate::state::AppState;

/// Outcome page of the callback route.
#[derive(Template, WebTemplate)]
#[template(path = "payment/result.html")]
pub struct PaymentResultTemplate {
    pub success: bool,
    pub message: String,
    pub order_id: Option<i32>,
    pub redirect_url: Option<String>,
    pub redirect_delay_ms: u128,
}

impl PaymentResultTemplate {
    fn completed(order: &Order, redirect_delay_ms: u128) -> Self {
        Self {
            success: true,
            message: "Your payment was completed successfully.".to_string(),
            order_id: Some(order.id.as_i32()),
            redirect_url: Some(format!("/orders/{}", order.id)),
            redirect_delay_ms,
        }
    }

    const fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            order_id: None,
            redirect_url: None,
            redirect_delay_ms: 0,
        }
    }
}

/// Callback route: verify the payment and create the order.
#[instrument(skip(state, session))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Response {
    let params = params.normalized();
    let stores = SessionStores::new(&state, &session);

    let outcome = match SessionCheckout::resume(stores.services(), state.checkout()).await {
        Ok(mut orchestrator) => orchestrator.handle_callback(params).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(order) => PaymentResultTemplate::completed(
            &order,
            state.config().checkout.confirmation_delay.as_millis(),
        )
        .into_response(),
        Err(e) => {
            let err = AppError::from(e);
            err.report();
            (
                err.status(),
                PaymentResultTemplate::failed(err.public_message()),
            )
                .into_response()
        }
    }
}

/// Page the bank redirects to; relays the parameters to the checkout page.
#[derive(Template, WebTemplate)]
#[template(path = "payment/bridge.html")]
pub struct BridgeTemplate {
    pub message: Value,
    pub target_origin: String,
    pub redirect_url: String,
    pub redirect_delay_ms: u128,
}

/// Read callback parameters from a form or JSON body.
fn body_params(headers: &HeaderMap, body: &[u8]) -> CallbackParams {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if content_type.contains("application/x-www-form-urlencoded") {
        let fields: Map<String, Value> = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
        CallbackParams::from_json(&Value::Object(fields))
    } else if content_type.contains("application/json") {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => CallbackParams::from_json(&value),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable JSON body on bank redirect");
                CallbackParams::default()
            }
        }
    } else {
        CallbackParams::default()
    }
}

/// The message the bridge posts to its parent window.
fn bridge_message(params: &CallbackParams) -> Value {
    let mut message = Map::new();
    message.insert(
        "type".to_string(),
        Value::String(PAYMENT_CALLBACK_TYPE.to_string()),
    );
    if let Ok(Value::Object(fields)) = serde_json::to_value(params) {
        message.extend(fields);
    }
    Value::Object(message)
}

/// Redirect bridge for the bank's 3-D Secure result (GET or POST).
///
/// Query parameters take precedence over body fields. Missing values are
/// left out rather than sent as placeholders.
#[instrument(skip_all)]
pub async fn bridge(
    State(state): State<AppState>,
    Query(query): Query<CallbackParams>,
    headers: HeaderMap,
    body: Bytes,
) -> BridgeTemplate {
    let params = query
        .normalized()
        .or(body_params(&headers, &body).normalized());

    tracing::info!(
        conversation_id = ?params.conversation_id,
        payment_id = ?params.payment_id,
        status = ?params.status,
        md_status = ?params.md_status,
        "Bank redirect received"
    );
    if !params.has_identifiers() {
        tracing::warn!("Bank redirect carried no payment identifiers");
    }

    let checkout = &state.config().checkout;
    BridgeTemplate {
        message: bridge_message(&params),
        target_origin: checkout.frontend_origin.clone(),
        redirect_url: params.callback_url(&state.config().base_url),
        redirect_delay_ms: checkout.bridge_redirect_delay.as_millis(),
    }
}
