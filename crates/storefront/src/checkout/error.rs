//! Checkout errors.

use thiserror::Error;
use vitrin_core::{AddressError, CardError};

use super::orchestrator::CheckoutState;
use super::stock::StockShortage;
use crate::db::RepositoryError;
use crate::payment::PaymentError;

/// Errors surfaced by the checkout flow.
///
/// Validation, stock and gateway variants carry a message meant for the
/// customer. Infrastructure variants do not and are reported as a generic
/// failure by the HTTP layer.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    InvalidAddress(#[from] AddressError),

    #[error("invalid card details: {0}")]
    InvalidCard(#[from] CardError),

    #[error("your cart is empty")]
    EmptyCart,

    /// One or more lines exceed the stock on hand.
    #[error("insufficient stock: {}", describe_shortages(.0))]
    InsufficientStock(Vec<StockShortage>),

    /// The gateway refused to start 3-D Secure; the message is the gateway's own.
    #[error("{0}")]
    GatewayRejected(String),

    #[error("payment failed: {0}")]
    VerificationFailed(String),

    #[error("payment information not found, please start checkout again")]
    PendingPaymentMissing,

    #[error("payment session expired, please start checkout again")]
    PendingPaymentExpired,

    #[error("invalid checkout transition from {from} to {to}")]
    InvalidTransition {
        from: CheckoutState,
        to: CheckoutState,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Session storage failed.
    #[error("checkout storage error: {0}")]
    Storage(String),
}

impl CheckoutError {
    /// Whether the customer can fix this by changing their input or cart.
    #[must_use]
    pub const fn is_customer_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::InvalidCard(_)
                | Self::EmptyCart
                | Self::InsufficientStock(_)
                | Self::GatewayRejected(_)
                | Self::VerificationFailed(_)
                | Self::PendingPaymentMissing
                | Self::PendingPaymentExpired
        )
    }

    /// Itemized shortages, when this is a stock conflict.
    #[must_use]
    pub fn shortages(&self) -> &[StockShortage] {
        match self {
            Self::InsufficientStock(shortages) => shortages,
            _ => &[],
        }
    }
}

fn describe_shortages(shortages: &[StockShortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
