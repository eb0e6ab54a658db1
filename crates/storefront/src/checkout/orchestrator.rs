//! Checkout orchestrator.
//!
//! Sequences stock validation, 3-D Secure initiation, the wait for the bank
//! redirect, verification and order finalization. One orchestrator lives for
//! one HTTP request; the state that must outlive it (pending payment, cart)
//! goes through the stores, and [`CheckoutOrchestrator::resume`] rebuilds the
//! authentication step when the customer comes back from the bank.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use vitrin_core::{CardDetails, Order, OrderDraft, ShippingAddress};

use super::bridge::{CallbackParams, FrameMessage, MessageListener};
use super::cart::CartStore;
use super::error::CheckoutError;
use super::finalizer::{OrderFinalizer, OrderStore};
use super::pending::{PendingPayment, PendingPaymentStore};
use super::stock::{StockShortage, StockStore, StockValidator};
use crate::config::StorefrontConfig;
use crate::payment::{
    AuthChallenge, BuyerInfo, InitiationOutcome, PaymentGateway, PaymentInitiator,
    PaymentRequest, PaymentSettings, PaymentVerifier, Verdict,
};

/// Where a checkout attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    ValidatingStock,
    AwaitingGatewayInit,
    /// The bank challenge is on screen.
    AwaitingAuthentication,
    Verifying,
    Finalizing,
    Success,
    Failed,
}

impl CheckoutState {
    /// States reachable from this one.
    #[must_use]
    pub const fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Idle => &[Self::ValidatingStock],
            Self::ValidatingStock => &[Self::AwaitingGatewayInit, Self::Failed],
            Self::AwaitingGatewayInit => &[Self::AwaitingAuthentication, Self::Failed],
            // Idle is the customer dismissing the challenge.
            Self::AwaitingAuthentication => &[Self::Verifying, Self::Idle],
            Self::Verifying => &[Self::Finalizing, Self::Failed],
            Self::Finalizing => &[Self::Success, Self::Failed],
            Self::Success | Self::Failed => &[Self::Idle],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ValidatingStock => "validating_stock",
            Self::AwaitingGatewayInit => "awaiting_gateway_init",
            Self::AwaitingAuthentication => "awaiting_authentication",
            Self::Verifying => "verifying",
            Self::Finalizing => "finalizing",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Checkout form as posted by the customer.
#[derive(Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub card_holder: String,
    #[serde(default)]
    pub card_number: String,
    /// `MM/YY`
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub cvc: String,
}

impl fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("full_name", &self.full_name)
            .field("city", &self.city)
            .field("card_number", &"[REDACTED]")
            .field("cvc", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl CheckoutForm {
    #[must_use]
    pub fn address(&self) -> ShippingAddress {
        ShippingAddress {
            label: self.label.trim().to_string(),
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address_line: self.address_line.trim().to_string(),
            city: self.city.trim().to_string(),
            district: self.district.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(),
        }
    }

    /// Validate the address and card fields.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidAddress` or `CheckoutError::InvalidCard`.
    pub fn validate(&self) -> Result<(ShippingAddress, CardDetails), CheckoutError> {
        let address = self.address();
        address.validate()?;
        let card = CardDetails::parse(&self.card_holder, &self.card_number, &self.expiry, &self.cvc)?;
        Ok((address, card))
    }
}

/// Fixed checkout parameters.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub payment: PaymentSettings,
    /// Where the bank sends the customer after the challenge.
    pub callback_url: String,
    /// Origin frame messages must come from.
    pub bridge_origin: String,
    /// Pause before the first verification call so the gateway's own
    /// redirect can settle.
    pub verify_delay: Duration,
    pub pending_ttl: Duration,
}

impl CheckoutSettings {
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            payment: PaymentSettings::from(&config.iyzico),
            callback_url: config.checkout.callback_url.clone(),
            bridge_origin: config.checkout.bridge_origin.clone(),
            verify_delay: config.checkout.verify_delay,
            pending_ttl: config.checkout.pending_ttl,
        }
    }
}

/// Collaborators the orchestrator drives.
pub struct CheckoutServices<'a, S, G, O, P, C> {
    pub stock: &'a S,
    pub gateway: &'a G,
    pub orders: &'a O,
    pub pending: &'a P,
    pub cart: &'a C,
}

pub struct CheckoutOrchestrator<'a, S, G, O, P, C> {
    services: CheckoutServices<'a, S, G, O, P, C>,
    settings: &'a CheckoutSettings,
    state: CheckoutState,
    listener: Option<MessageListener>,
}

impl<'a, S, G, O, P, C> CheckoutOrchestrator<'a, S, G, O, P, C>
where
    S: StockStore,
    G: PaymentGateway,
    O: OrderStore,
    P: PendingPaymentStore,
    C: CartStore,
{
    /// Start a fresh attempt in `Idle`.
    #[must_use]
    pub const fn new(
        services: CheckoutServices<'a, S, G, O, P, C>,
        settings: &'a CheckoutSettings,
    ) -> Self {
        Self {
            services,
            settings,
            state: CheckoutState::Idle,
            listener: None,
        }
    }

    /// Rebuild the authentication step after the customer left the page.
    ///
    /// The message listener is armed only if a pending payment exists; the
    /// callback route still proceeds to verification without one and fails
    /// there.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Storage` if the pending store cannot be read.
    pub async fn resume(
        services: CheckoutServices<'a, S, G, O, P, C>,
        settings: &'a CheckoutSettings,
    ) -> Result<Self, CheckoutError> {
        let listener = services
            .pending
            .load()
            .await?
            .map(|entry| MessageListener::new(&settings.bridge_origin, entry.correlation_id));

        Ok(Self {
            services,
            settings,
            state: CheckoutState::AwaitingAuthentication,
            listener,
        })
    }

    #[must_use]
    pub const fn state(&self) -> CheckoutState {
        self.state
    }

    /// The frame-message listener, present only while authenticating.
    #[must_use]
    pub const fn listener(&self) -> Option<&MessageListener> {
        self.listener.as_ref()
    }

    fn transition(&mut self, next: CheckoutState) -> Result<(), CheckoutError> {
        if !self.state.can_transition_to(next) {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        debug!(from = %self.state, to = %next, "Checkout transition");
        if next != CheckoutState::AwaitingAuthentication {
            self.listener = None;
        }
        self.state = next;
        Ok(())
    }

    /// Move to `Failed` (when allowed from here) and hand the error back.
    fn fail(&mut self, error: CheckoutError) -> CheckoutError {
        if self.state.can_transition_to(CheckoutState::Failed) {
            if error.is_customer_facing() {
                warn!(from = %self.state, error = %error, "Checkout failed");
            } else {
                error!(from = %self.state, error = %error, "Checkout failed");
            }
            self.state = CheckoutState::Failed;
            self.listener = None;
        }
        error
    }

    /// Itemized stock check of the current cart, without changing state.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` if stock cannot be read.
    pub async fn check_cart_stock(&self) -> Result<Vec<StockShortage>, CheckoutError> {
        let cart = self.services.cart.load().await?;
        Ok(StockValidator::new(self.services.stock)
            .check_lines(cart.lines())
            .await?)
    }

    /// Submit the checkout form and start 3-D Secure.
    ///
    /// Malformed input is rejected before any state change. On success the
    /// pending payment is stored and the bank challenge returned for display.
    ///
    /// # Errors
    ///
    /// - `InvalidAddress`, `InvalidCard`, `EmptyCart`: nothing happened
    /// - `InsufficientStock`: itemized shortages, the gateway was not called
    /// - `GatewayRejected`: the gateway's own message, nothing was stored
    #[instrument(skip_all, fields(user_id = %buyer.user_id))]
    pub async fn submit(
        &mut self,
        buyer: &BuyerInfo,
        form: &CheckoutForm,
    ) -> Result<AuthChallenge, CheckoutError> {
        if self.state != CheckoutState::Idle {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: CheckoutState::ValidatingStock,
            });
        }

        let (address, card) = form.validate()?;
        let cart = self.services.cart.load().await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.transition(CheckoutState::ValidatingStock)?;
        let validator = StockValidator::new(self.services.stock);
        match validator.check_lines(cart.lines()).await {
            Ok(shortages) if shortages.is_empty() => {}
            Ok(shortages) => return Err(self.fail(CheckoutError::InsufficientStock(shortages))),
            Err(e) => return Err(self.fail(e.into())),
        }

        self.transition(CheckoutState::AwaitingGatewayInit)?;
        let settings = self.settings;
        let draft = OrderDraft::new(buyer.user_id, cart.into_lines(), address);
        let initiator = PaymentInitiator::new(self.services.gateway, &settings.payment);
        let outcome = initiator
            .initialize_3ds(PaymentRequest {
                card: &card,
                buyer,
                lines: &draft.cart,
                total_amount: draft.total_amount,
                callback_url: &settings.callback_url,
                shipping_address: &draft.shipping_address,
            })
            .await;

        let challenge = match outcome {
            Ok(InitiationOutcome::Challenge(challenge)) => challenge,
            Ok(InitiationOutcome::Rejected { error_message }) => {
                return Err(self.fail(CheckoutError::GatewayRejected(error_message)));
            }
            Err(e) => return Err(self.fail(e.into())),
        };

        let entry = PendingPayment::new(challenge.correlation_id.clone(), draft);
        if let Err(e) = self.services.pending.save(&entry).await {
            return Err(self.fail(e));
        }

        self.transition(CheckoutState::AwaitingAuthentication)?;
        self.listener = Some(MessageListener::new(
            &settings.bridge_origin,
            &challenge.correlation_id,
        ));
        info!(correlation_id = %challenge.correlation_id, "Awaiting 3-D Secure authentication");

        Ok(challenge)
    }

    /// Handle a `message` event relayed from the authentication frame.
    ///
    /// Returns `Ok(None)` when no listener is armed or the message is not
    /// ours; the state is unchanged in that case.
    ///
    /// # Errors
    ///
    /// See [`Self::handle_callback`].
    pub async fn handle_frame_message(
        &mut self,
        message: &FrameMessage,
    ) -> Result<Option<Order>, CheckoutError> {
        if self.state != CheckoutState::AwaitingAuthentication {
            return Ok(None);
        }
        let Some(params) = self.listener.as_ref().and_then(|l| l.accept(message)) else {
            return Ok(None);
        };

        self.complete(params).await.map(Some)
    }

    /// Handle the customer landing on the callback route.
    ///
    /// # Errors
    ///
    /// - `PendingPaymentMissing` / `PendingPaymentExpired`: must restart checkout
    /// - `VerificationFailed`: the gateway's message; the pending entry stays
    /// - `InsufficientStock`: stock ran out before the order was written
    /// - `InvalidTransition`: not on the authentication step
    pub async fn handle_callback(&mut self, params: CallbackParams) -> Result<Order, CheckoutError> {
        if self.state != CheckoutState::AwaitingAuthentication {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: CheckoutState::Verifying,
            });
        }
        self.complete(params).await
    }

    #[instrument(skip_all, fields(payment_id = ?params.payment_id, correlation_id))]
    async fn complete(&mut self, params: CallbackParams) -> Result<Order, CheckoutError> {
        self.transition(CheckoutState::Verifying)?;
        let settings = self.settings;

        if !settings.verify_delay.is_zero() {
            tokio::time::sleep(settings.verify_delay).await;
        }

        let pending = match self.services.pending.load().await {
            Ok(Some(pending)) => pending,
            Ok(None) => return Err(self.fail(CheckoutError::PendingPaymentMissing)),
            Err(e) => return Err(self.fail(e)),
        };
        tracing::Span::current().record("correlation_id", pending.correlation_id.as_str());

        if pending.is_expired(settings.pending_ttl, Utc::now()) {
            if let Err(e) = self.services.pending.clear().await {
                error!(error = %e, "Failed to clear expired pending payment");
            }
            return Err(self.fail(CheckoutError::PendingPaymentExpired));
        }

        if let Some(conversation_id) = &params.conversation_id
            && conversation_id != &pending.correlation_id
        {
            return Err(self.fail(CheckoutError::VerificationFailed(
                "the payment callback does not match the pending payment".to_string(),
            )));
        }

        let Some(payment_id) = params.payment_id.clone() else {
            return Err(self.fail(CheckoutError::VerificationFailed(
                "the payment callback carries no payment id".to_string(),
            )));
        };

        let verifier = PaymentVerifier::new(self.services.gateway, &settings.payment);
        let verdict = match verifier
            .verify(&pending.correlation_id, &payment_id, &params)
            .await
        {
            Ok(verdict) => verdict,
            Err(e) => return Err(self.fail(e.into())),
        };

        let payment_id = match verdict {
            Verdict::Success { payment_id } => payment_id,
            Verdict::Error { error_message } => {
                return Err(self.fail(CheckoutError::VerificationFailed(error_message)));
            }
        };

        self.transition(CheckoutState::Finalizing)?;
        let finalizer = OrderFinalizer::new(self.services.stock, self.services.orders);
        let order = match finalizer
            .finalize(&pending.order_draft, &pending.correlation_id, &payment_id)
            .await
        {
            Ok(order) => order,
            Err(e) => return Err(self.fail(e)),
        };

        // The order stands from here on; clean-up failures are only logged.
        if let Err(e) = self.services.pending.clear().await {
            error!(order_id = %order.id, error = %e, "Failed to clear pending payment");
        }
        if let Err(e) = self.services.cart.clear().await {
            error!(order_id = %order.id, error = %e, "Failed to clear cart");
        }

        self.transition(CheckoutState::Success)?;
        Ok(order)
    }

    /// Dismiss the authentication frame without verifying.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` outside the authentication step, or
    /// `Storage` if the pending entry cannot be cleared.
    pub async fn cancel(&mut self) -> Result<(), CheckoutError> {
        if self.state != CheckoutState::AwaitingAuthentication {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: CheckoutState::Idle,
            });
        }

        self.services.pending.clear().await?;
        self.transition(CheckoutState::Idle)?;
        info!("3-D Secure authentication dismissed");
        Ok(())
    }

    /// Start over after a finished attempt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the attempt succeeded or failed.
    pub fn reset(&mut self) -> Result<(), CheckoutError> {
        if !self.state.is_terminal() {
            return Err(CheckoutError::InvalidTransition {
                from: self.state,
                to: CheckoutState::Idle,
            });
        }
        self.transition(CheckoutState::Idle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;
    use vitrin_core::{Email, UserId};

    use super::super::cart::MemoryCartStore;
    use super::super::pending::MemoryPendingStore;
    use super::super::test_support::{Gateway, Orders, Stock, line};
    use super::*;

    const ORIGIN: &str = "https://shop.example.com";

    fn settings() -> CheckoutSettings {
        CheckoutSettings {
            payment: PaymentSettings::default(),
            callback_url: format!("{ORIGIN}/payment/3ds-return"),
            bridge_origin: ORIGIN.to_string(),
            verify_delay: Duration::ZERO,
            pending_ttl: Duration::from_secs(30 * 60),
        }
    }

    fn buyer() -> BuyerInfo {
        BuyerInfo {
            user_id: UserId::new(7),
            email: Email::parse("customer@example.com").unwrap(),
            ip: "127.0.0.1".to_string(),
        }
    }

    fn form() -> CheckoutForm {
        CheckoutForm {
            full_name: "Ada Lovelace".to_string(),
            phone: "5321112233".to_string(),
            address_line: "Moda Cd. 5".to_string(),
            city: "İstanbul".to_string(),
            card_holder: "Ada Lovelace".to_string(),
            card_number: "5528 7900 0000 0008".to_string(),
            expiry: "12/30".to_string(),
            cvc: "123".to_string(),
            ..CheckoutForm::default()
        }
    }

    struct World {
        stock: Stock,
        gateway: Gateway,
        orders: Orders,
        pending: MemoryPendingStore,
        cart: MemoryCartStore,
        settings: CheckoutSettings,
    }

    impl World {
        fn new(stock: Stock, cart: Vec<vitrin_core::CartLine>) -> Self {
            Self {
                stock,
                gateway: Gateway::challenging("c1"),
                orders: Orders::default(),
                pending: MemoryPendingStore::new(),
                cart: MemoryCartStore::with_lines(cart),
                settings: settings(),
            }
        }

        fn services(&self) -> CheckoutServices<'_, Stock, Gateway, Orders, MemoryPendingStore, MemoryCartStore> {
            CheckoutServices {
                stock: &self.stock,
                gateway: &self.gateway,
                orders: &self.orders,
                pending: &self.pending,
                cart: &self.cart,
            }
        }
    }

    #[test]
    fn test_success_cannot_reenter_finalizing() {
        assert!(!CheckoutState::Success.can_transition_to(CheckoutState::Finalizing));
        assert!(!CheckoutState::Success.can_transition_to(CheckoutState::Verifying));
        assert!(CheckoutState::Failed.can_transition_to(CheckoutState::Idle));
        assert!(CheckoutState::AwaitingAuthentication.can_transition_to(CheckoutState::Idle));
        assert!(!CheckoutState::Idle.can_transition_to(CheckoutState::Finalizing));
    }

    #[tokio::test]
    async fn test_invalid_form_leaves_state_idle() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);

        let mut bad = form();
        bad.city = String::new();
        let err = checkout.submit(&buyer(), &bad).await.unwrap_err();

        assert!(matches!(err, CheckoutError::InvalidAddress(_)));
        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert_eq!(world.gateway.init_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_stores_pending_and_arms_listener() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 2)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);

        let challenge = checkout.submit(&buyer(), &form()).await.unwrap();

        assert_eq!(challenge.correlation_id, "c1");
        assert!(challenge.auth_document.contains("bank"));
        assert_eq!(checkout.state(), CheckoutState::AwaitingAuthentication);
        assert_eq!(checkout.listener().unwrap().correlation_id(), "c1");
        let pending = world.pending.snapshot().unwrap();
        assert_eq!(pending.order_draft.cart.len(), 1);
        assert_eq!(pending.order_draft.total_amount, rust_decimal::Decimal::new(100_000, 2));
    }

    #[tokio::test]
    async fn test_frame_message_from_other_origin_is_ignored() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);
        checkout.submit(&buyer(), &form()).await.unwrap();

        let result = checkout
            .handle_frame_message(&FrameMessage {
                origin: "https://attacker.example.net".to_string(),
                data: json!({"type": "PAYMENT_CALLBACK", "paymentId": "p1", "mdStatus": "1"}),
            })
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(checkout.state(), CheckoutState::AwaitingAuthentication);
        assert_eq!(world.gateway.auth_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_clears_pending_without_verifying() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);
        checkout.submit(&buyer(), &form()).await.unwrap();

        checkout.cancel().await.unwrap();

        assert_eq!(checkout.state(), CheckoutState::Idle);
        assert!(checkout.listener().is_none());
        assert!(world.pending.snapshot().is_none());
        assert_eq!(world.gateway.auth_count(), 0);
    }

    #[tokio::test]
    async fn test_callback_without_pending_fails() {
        let world = World::new(Stock::default(), vec![]);
        let mut checkout = CheckoutOrchestrator::resume(world.services(), &world.settings)
            .await
            .unwrap();
        assert!(checkout.listener().is_none());

        let err = checkout
            .handle_callback(CallbackParams {
                payment_id: Some("p1".to_string()),
                md_status: Some("1".to_string()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PendingPaymentMissing));
        assert_eq!(checkout.state(), CheckoutState::Failed);
        assert_eq!(world.gateway.auth_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_pending_is_cleared_and_fails() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        let mut entry = PendingPayment::new(
            "c1",
            OrderDraft::new(UserId::new(7), vec![line("BG-1", "M", 1)], form().address()),
        );
        entry.created_at -= chrono::Duration::hours(2);
        world.pending.save(&entry).await.unwrap();

        let mut checkout = CheckoutOrchestrator::resume(world.services(), &world.settings)
            .await
            .unwrap();
        let err = checkout
            .handle_callback(CallbackParams {
                payment_id: Some("p1".to_string()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::PendingPaymentExpired));
        assert!(world.pending.snapshot().is_none());
        assert_eq!(world.orders.count(), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_keeps_pending() {
        let mut world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        world.gateway.auth_response = json!({"status": "failure", "errorMessage": "Card declined"});
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);
        checkout.submit(&buyer(), &form()).await.unwrap();

        let err = checkout
            .handle_callback(CallbackParams {
                conversation_id: Some("c1".to_string()),
                payment_id: Some("p1".to_string()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "payment failed: Card declined");
        assert_eq!(checkout.state(), CheckoutState::Failed);
        assert!(world.pending.snapshot().is_some());
        assert_eq!(world.orders.count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_time_shortage_creates_no_order() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 2)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);
        checkout.submit(&buyer(), &form()).await.unwrap();
        world.stock.set("BG-1", "M", 1);

        let err = checkout
            .handle_callback(CallbackParams {
                payment_id: Some("p1".to_string()),
                md_status: Some("1".to_string()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::InsufficientStock(_)));
        assert_eq!(checkout.state(), CheckoutState::Failed);
        assert_eq!(world.orders.count(), 0);
        assert_eq!(world.stock.get("BG-1", "M"), 1);
    }

    #[tokio::test]
    async fn test_callback_for_other_conversation_is_rejected() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);
        checkout.submit(&buyer(), &form()).await.unwrap();

        let err = checkout
            .handle_callback(CallbackParams {
                conversation_id: Some("stale".to_string()),
                payment_id: Some("p1".to_string()),
                md_status: Some("1".to_string()),
                ..CallbackParams::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::VerificationFailed(_)));
        assert_eq!(world.gateway.auth_count(), 0);
    }

    #[tokio::test]
    async fn test_finished_attempt_cannot_verify_again() {
        let world = World::new(Stock::with("BG-1", "M", 5), vec![line("BG-1", "M", 1)]);
        let mut checkout = CheckoutOrchestrator::new(world.services(), &world.settings);
        checkout.submit(&buyer(), &form()).await.unwrap();
        let params = CallbackParams {
            payment_id: Some("p1".to_string()),
            md_status: Some("1".to_string()),
            ..CallbackParams::default()
        };

        checkout.handle_callback(params.clone()).await.unwrap();
        assert_eq!(checkout.state(), CheckoutState::Success);

        let err = checkout.handle_callback(params).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidTransition {
                from: CheckoutState::Success,
                to: CheckoutState::Verifying
            }
        ));
        assert_eq!(world.orders.count(), 1);

        checkout.reset().unwrap();
        assert_eq!(checkout.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_finalizer_returns_existing_order_for_same_payment() {
        let stock = Stock::with("BG-1", "M", 5);
        let orders = Orders::default();
        let finalizer = OrderFinalizer::new(&stock, &orders);
        let draft = OrderDraft::new(UserId::new(7), vec![line("BG-1", "M", 2)], form().address());

        let first = finalizer.finalize(&draft, "c1", "p1").await.unwrap();
        let second = finalizer.finalize(&draft, "c1", "p1").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(orders.count(), 1);
        assert_eq!(stock.get("BG-1", "M"), 3);
    }
}
