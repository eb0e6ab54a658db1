//! Payment verification.
//!
//! The auth endpoint's answer has been seen in several shapes, so success is
//! decided by [`interpret_verdict`], which accepts any one affirmative signal.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::types::AuthRequest;
use super::{PaymentError, PaymentGateway, PaymentSettings};
use crate::checkout::CallbackParams;

/// Normalized verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Verdict {
    Success { payment_id: String },
    Error { error_message: String },
}

impl Verdict {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Decide whether a payment succeeded.
///
/// Checked in order, any one is enough:
/// 1. body `status == "success"`
/// 2. body `paymentStatus == "SUCCESS"`
/// 3. body `mdStatus == 1` (number or string)
/// 4. redirect URL `mdStatus == "1"` or `status == "success"`, consulted
///    only when the body carries none of `status`, `paymentStatus`,
///    `mdStatus`, `errorCode` or `errorMessage`
///
/// The payment id comes from the body, falling back to the redirect URL.
#[must_use]
pub fn interpret_verdict(raw: &Value, url_params: &CallbackParams) -> Verdict {
    let body_status = raw.get("status").and_then(Value::as_str) == Some("success");
    let payment_status = raw.get("paymentStatus").and_then(Value::as_str) == Some("SUCCESS");
    let body_md_status = raw.get("mdStatus").is_some_and(is_md_status_one);
    let url_signal = is_ambiguous(raw)
        && (url_params.md_status.as_deref() == Some("1")
            || url_params.status.as_deref() == Some("success"));

    if body_status || payment_status || body_md_status || url_signal {
        let payment_id = string_field(raw, "paymentId")
            .or_else(|| url_params.payment_id.clone())
            .unwrap_or_default();
        return Verdict::Success { payment_id };
    }

    let error_message = string_field(raw, "errorMessage")
        .or_else(|| {
            string_field(raw, "mdStatus")
                .map(|md| format!("3-D Secure authentication failed (mdStatus {md})"))
        })
        .unwrap_or_else(|| "Payment could not be verified".to_string());

    Verdict::Error { error_message }
}

/// A body with no verdict of its own. The redirect URL can be forged by the
/// customer, so it only counts when the gateway said nothing.
fn is_ambiguous(raw: &Value) -> bool {
    ["status", "paymentStatus", "mdStatus", "errorCode", "errorMessage"]
        .iter()
        .all(|field| raw.get(field).is_none_or(Value::is_null))
}

fn is_md_status_one(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

fn string_field(raw: &Value, name: &str) -> Option<String> {
    match raw.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct PaymentVerifier<'a, G> {
    gateway: &'a G,
    settings: &'a PaymentSettings,
}

impl<'a, G: PaymentGateway> PaymentVerifier<'a, G> {
    #[must_use]
    pub const fn new(gateway: &'a G, settings: &'a PaymentSettings) -> Self {
        Self { gateway, settings }
    }

    /// Confirm authentication with the gateway.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the gateway cannot be reached or its answer
    /// cannot be read. A declined payment is `Ok(Verdict::Error)`.
    #[instrument(skip(self, url_params))]
    pub async fn verify(
        &self,
        correlation_id: &str,
        payment_id: &str,
        url_params: &CallbackParams,
    ) -> Result<Verdict, PaymentError> {
        let request = AuthRequest {
            locale: self.settings.locale.clone(),
            conversation_id: correlation_id.to_string(),
            payment_id: payment_id.to_string(),
        };

        let raw = self.gateway.auth_3ds(&request).await?;

        let verdict = match interpret_verdict(&raw, url_params) {
            Verdict::Success { payment_id: id } if id.is_empty() => Verdict::Success {
                payment_id: payment_id.to_string(),
            },
            verdict => verdict,
        };

        match &verdict {
            Verdict::Success { payment_id } => {
                info!(correlation_id, payment_id = %payment_id, "Payment verified");
            }
            Verdict::Error { error_message } => {
                warn!(correlation_id, payment_id, error_message = %error_message, "Payment verification failed");
            }
        }

        Ok(verdict)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn url(status: Option<&str>, md_status: Option<&str>) -> CallbackParams {
        CallbackParams {
            conversation_id: Some("c1".to_string()),
            payment_id: Some("p-url".to_string()),
            status: status.map(String::from),
            md_status: md_status.map(String::from),
        }
    }

    #[test]
    fn test_body_status_success_alone() {
        let verdict = interpret_verdict(
            &json!({"status": "success", "paymentId": "p1"}),
            &url(None, None),
        );
        assert_eq!(
            verdict,
            Verdict::Success {
                payment_id: "p1".to_string()
            }
        );
    }

    #[test]
    fn test_payment_status_alone() {
        let verdict = interpret_verdict(
            &json!({"status": "failure", "paymentStatus": "SUCCESS"}),
            &url(None, None),
        );
        assert!(verdict.is_success());
    }

    #[test]
    fn test_body_md_status_numeric_or_string() {
        assert!(interpret_verdict(&json!({"mdStatus": 1}), &url(None, None)).is_success());
        assert!(interpret_verdict(&json!({"mdStatus": "1"}), &url(None, None)).is_success());
        assert!(!interpret_verdict(&json!({"mdStatus": 0}), &url(None, None)).is_success());
    }

    #[test]
    fn test_url_params_alone() {
        let body = json!({"paymentId": "p1"});
        assert!(interpret_verdict(&body, &url(None, Some("1"))).is_success());
        assert!(interpret_verdict(&body, &url(Some("success"), None)).is_success());
        assert!(interpret_verdict(&json!({}), &url(None, Some("1"))).is_success());
    }

    #[test]
    fn test_url_params_cannot_override_explicit_decline() {
        let body = json!({
            "status": "failure",
            "errorCode": "10051",
            "errorMessage": "Card declined",
            "paymentStatus": "FAILURE",
            "mdStatus": "0"
        });
        assert_eq!(
            interpret_verdict(&body, &url(Some("success"), Some("1"))),
            Verdict::Error {
                error_message: "Card declined".to_string()
            }
        );

        let bare_failure = json!({"status": "failure"});
        assert!(!interpret_verdict(&bare_failure, &url(None, Some("1"))).is_success());

        let error_code_only = json!({"errorCode": "10051"});
        assert!(!interpret_verdict(&error_code_only, &url(None, Some("1"))).is_success());
    }

    #[test]
    fn test_payment_id_falls_back_to_url() {
        let verdict = interpret_verdict(&json!({"mdStatus": "1"}), &url(None, None));
        assert_eq!(
            verdict,
            Verdict::Success {
                payment_id: "p-url".to_string()
            }
        );
    }

    #[test]
    fn test_no_signal_is_error_with_gateway_message() {
        let verdict = interpret_verdict(
            &json!({"status": "failure", "errorMessage": "Card declined", "mdStatus": "0"}),
            &url(Some("failure"), Some("0")),
        );
        assert_eq!(
            verdict,
            Verdict::Error {
                error_message: "Card declined".to_string()
            }
        );
    }

    #[test]
    fn test_verdict_serializes_in_normalized_shape() {
        let json = serde_json::to_value(Verdict::Success {
            payment_id: "p1".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"status": "success", "paymentId": "p1"}));

        let json = serde_json::to_value(Verdict::Error {
            error_message: "no".to_string(),
        })
        .unwrap();
        assert_eq!(json, json!({"status": "error", "errorMessage": "no"}));
    }
}
