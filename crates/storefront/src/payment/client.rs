//! HTTP client for the iyzico 3-D Secure API.

use std::sync::Arc;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::signature::{RandomKeySource, sign_request};
use super::types::{AuthRequest, InitializeRequest, InitializeResponse};
use super::{PaymentError, PaymentGateway};
use crate::config::IyzicoConfig;

const INITIALIZE_PATH: &str = "/payment/3dsecure/initialize";
const AUTH_PATH: &str = "/payment/3dsecure/auth";
const CLIENT_VERSION: &str = concat!("vitrin-storefront-", env!("CARGO_PKG_VERSION"));

/// Signed JSON client for the gateway.
#[derive(Clone)]
pub struct IyzicoClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    secret_key: SecretString,
    random_keys: Arc<RandomKeySource>,
}

impl std::fmt::Debug for IyzicoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IyzicoClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl IyzicoClient {
    /// Create a client from the gateway configuration.
    #[must_use]
    pub fn new(config: &IyzicoConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            random_keys: Arc::new(RandomKeySource::new()),
        }
    }

    /// Sign and post `body` to `path`, decoding the JSON answer.
    ///
    /// The gateway reports business failures inside a 200 body, so a JSON
    /// body is decoded whatever the HTTP status. Only an unreadable non-2xx
    /// answer becomes `PaymentError::Http`.
    async fn post_signed<B, R>(&self, path: &str, body: &B) -> Result<R, PaymentError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let body =
            serde_json::to_string(body).map_err(|e| PaymentError::Signing(e.to_string()))?;
        let random_key = self.random_keys.next_key();
        let headers = sign_request(&self.api_key, &self.secret_key, &random_key, path, &body)?;

        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, headers.authorization)
            .header(CONTENT_TYPE, "application/json")
            .header("x-iyzi-rnd", headers.random_key)
            .header("x-iyzi-client-version", CLIENT_VERSION)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<R>(&text) {
            Ok(decoded) => {
                if !status.is_success() {
                    warn!(status = status.as_u16(), path, "Gateway returned non-success HTTP status");
                }
                Ok(decoded)
            }
            Err(e) if status.is_success() => Err(PaymentError::Response(e.to_string())),
            Err(_) => Err(PaymentError::Http {
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}

impl PaymentGateway for IyzicoClient {
    #[instrument(skip(self, request), fields(correlation_id = %request.conversation_id))]
    async fn initialize_3ds(
        &self,
        request: &InitializeRequest,
    ) -> Result<InitializeResponse, PaymentError> {
        let response: InitializeResponse = self.post_signed(INITIALIZE_PATH, request).await?;
        debug!(status = %response.status, "3-D Secure initialize answered");
        Ok(response)
    }

    #[instrument(
        skip(self, request),
        fields(correlation_id = %request.conversation_id, payment_id = %request.payment_id)
    )]
    async fn auth_3ds(&self, request: &AuthRequest) -> Result<serde_json::Value, PaymentError> {
        let response: serde_json::Value = self.post_signed(AUTH_PATH, request).await?;
        debug!(status = ?response.get("status"), "3-D Secure auth answered");
        Ok(response)
    }
}
