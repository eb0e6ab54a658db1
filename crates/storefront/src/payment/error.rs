//! Payment gateway errors.

use thiserror::Error;

/// Errors that can occur when talking to the payment gateway.
///
/// These are transport-level failures. A gateway that answers with
/// `status: "failure"` is not an error here; that is a rejection and is
/// reported through the initiator and verifier outcomes.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed before a response arrived.
    #[error("payment gateway request failed: {0}")]
    Request(String),

    /// Gateway answered with a non-success HTTP status and no readable body.
    #[error("payment gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be decoded.
    #[error("payment gateway response error: {0}")]
    Response(String),

    /// Request could not be signed.
    #[error("payment request signing failed: {0}")]
    Signing(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}
