//! Payment gateway integration (iyzico 3-D Secure).
//!
//! - [`IyzicoClient`] signs and sends requests
//! - [`PaymentInitiator`] builds the initialize payload and decodes the
//!   bank's challenge page
//! - [`PaymentVerifier`] confirms authentication and normalizes the verdict

mod client;
mod error;
pub mod initiator;
pub mod signature;
pub mod types;
pub mod verifier;

use std::future::Future;

pub use client::IyzicoClient;
pub use error::PaymentError;
pub use initiator::{
    AuthChallenge, BuyerInfo, InitiationOutcome, PaymentInitiator, PaymentRequest,
    PaymentSettings, decode_auth_document,
};
pub use verifier::{PaymentVerifier, Verdict, interpret_verdict};

use types::{AuthRequest, InitializeRequest, InitializeResponse};

/// The two gateway calls checkout needs.
pub trait PaymentGateway: Send + Sync {
    /// Start 3-D Secure for a card payment.
    fn initialize_3ds(
        &self,
        request: &InitializeRequest,
    ) -> impl Future<Output = Result<InitializeResponse, PaymentError>> + Send;

    /// Confirm authentication. The raw body is returned because its shape
    /// varies; see [`interpret_verdict`].
    fn auth_3ds(
        &self,
        request: &AuthRequest,
    ) -> impl Future<Output = Result<serde_json::Value, PaymentError>> + Send;
}
