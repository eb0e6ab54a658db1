//! `IYZWSv2` request signing.
//!
//! Every gateway call carries an `Authorization` header of the form
//! `IYZWSv2 base64("apiKey:<key>&randomKey:<rnd>&signature:<hex>")`, where the
//! signature is HMAC-SHA256 over `<rnd><uri path><json body>` keyed by the
//! secret key. The random key is a unix-millisecond timestamp that is never
//! handed out twice by the same [`RandomKeySource`].

use std::sync::atomic::{AtomicI64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::PaymentError;

/// Authorization scheme name.
pub const AUTH_SCHEME: &str = "IYZWSv2";

/// Headers produced by signing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value of the `Authorization` header.
    pub authorization: String,
    /// Value of the `x-iyzi-rnd` header.
    pub random_key: String,
}

/// Hex-encoded HMAC-SHA256 of `random_key + uri_path + body`.
///
/// # Errors
///
/// Returns `PaymentError::Signing` if the key is rejected by the MAC.
pub fn signature(
    secret_key: &SecretString,
    random_key: &str,
    uri_path: &str,
    body: &str,
) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.expose_secret().as_bytes())
        .map_err(|e| PaymentError::Signing(e.to_string()))?;

    mac.update(random_key.as_bytes());
    mac.update(uri_path.as_bytes());
    mac.update(body.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build the authorization headers for one request.
///
/// # Errors
///
/// Returns `PaymentError::Signing` if the signature cannot be computed.
pub fn sign_request(
    api_key: &SecretString,
    secret_key: &SecretString,
    random_key: &str,
    uri_path: &str,
    body: &str,
) -> Result<SignedHeaders, PaymentError> {
    let signature = signature(secret_key, random_key, uri_path, body)?;
    let params = format!(
        "apiKey:{}&randomKey:{random_key}&signature:{signature}",
        api_key.expose_secret()
    );

    Ok(SignedHeaders {
        authorization: format!("{AUTH_SCHEME} {}", STANDARD.encode(params)),
        random_key: random_key.to_owned(),
    })
}

/// Hands out strictly increasing millisecond timestamps.
///
/// Two requests signed within the same millisecond still get distinct keys,
/// so signing inputs are never reused.
#[derive(Debug, Default)]
pub struct RandomKeySource {
    last: AtomicI64,
}

impl RandomKeySource {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Next random key as a decimal string.
    pub fn next_key(&self) -> String {
        self.next_after(Utc::now().timestamp_millis()).to_string()
    }

    fn next_after(&self, now_ms: i64) -> i64 {
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now_ms.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now_ms.max(previous.saturating_add(1))
    }
}
