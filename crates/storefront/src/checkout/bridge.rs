//! Redirect bridge contract.
//!
//! After the bank challenge the gateway sends the customer's frame to the
//! bridge, by GET with query parameters or by POST with a form or JSON body.
//! The bridge normalizes those into [`CallbackParams`], posts a
//! `PAYMENT_CALLBACK` message to the parent window when framed, and otherwise
//! navigates the top-level window to the callback route with the same
//! parameters.
//!
//! The parent page relays the message it received (together with the origin
//! the browser reported for it) to the server as a [`FrameMessage`]. Only a
//! [`MessageListener`] armed while the customer is on the authentication
//! step accepts it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::config::PAYMENT_CALLBACK_PATH;

/// `type` field of the message the bridge posts to its parent.
pub const PAYMENT_CALLBACK_TYPE: &str = "PAYMENT_CALLBACK";

/// Parameters the bank redirect carries back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_status: Option<String>,
}

impl CallbackParams {
    /// Read the parameters from a JSON object, accepting strings or numbers.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        let field = |name: &str| match value.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Self {
            conversation_id: field("conversationId"),
            payment_id: field("paymentId"),
            status: field("status"),
            md_status: field("mdStatus"),
        }
        .normalized()
    }

    /// Drop blank values and the literal strings `null` and `undefined`,
    /// which some gateway redirects emit for absent fields.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty() && v != "null" && v != "undefined")
        }

        Self {
            conversation_id: keep(self.conversation_id),
            payment_id: keep(self.payment_id),
            status: keep(self.status),
            md_status: keep(self.md_status),
        }
    }

    /// Whether both identifiers are present.
    #[must_use]
    pub const fn has_identifiers(&self) -> bool {
        self.conversation_id.is_some() && self.payment_id.is_some()
    }

    /// Fill the fields missing here from `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            conversation_id: self.conversation_id.or(other.conversation_id),
            payment_id: self.payment_id.or(other.payment_id),
            status: self.status.or(other.status),
            md_status: self.md_status.or(other.md_status),
        }
    }

    /// Encode the present fields as a query string.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (name, value) in [
            ("conversationId", &self.conversation_id),
            ("paymentId", &self.payment_id),
            ("status", &self.status),
            ("mdStatus", &self.md_status),
        ] {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
        query.finish()
    }

    /// Callback route URL under `base_url` carrying these parameters.
    #[must_use]
    pub fn callback_url(&self, base_url: &str) -> String {
        let query = self.to_query_string();
        let base = base_url.trim_end_matches('/');
        if query.is_empty() {
            format!("{base}{PAYMENT_CALLBACK_PATH}")
        } else {
            format!("{base}{PAYMENT_CALLBACK_PATH}?{query}")
        }
    }
}

/// A `message` event relayed by the checkout page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameMessage {
    /// `event.origin` as reported by the browser.
    pub origin: String,
    /// `event.data`.
    pub data: Value,
}

/// Accepts bridge messages for one pending payment.
///
/// Exists only while the orchestrator is in the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageListener {
    bridge_origin: String,
    correlation_id: String,
}

impl MessageListener {
    #[must_use]
    pub fn new(bridge_origin: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            bridge_origin: bridge_origin.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// The correlation id this listener waits for.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Extract the callback parameters if the message is ours.
    ///
    /// Returns `None` for messages from another origin, of another type, or
    /// for another conversation.
    #[must_use]
    pub fn accept(&self, message: &FrameMessage) -> Option<CallbackParams> {
        if message.origin.trim_end_matches('/') != self.bridge_origin {
            warn!(
                origin = %message.origin,
                expected = %self.bridge_origin,
                "Ignoring frame message from unexpected origin"
            );
            return None;
        }

        if message.data.get("type").and_then(Value::as_str) != Some(PAYMENT_CALLBACK_TYPE) {
            debug!("Ignoring frame message of another type");
            return None;
        }

        let params = CallbackParams::from_json(&message.data);
        if let Some(conversation_id) = &params.conversation_id
            && conversation_id != &self.correlation_id
        {
            warn!(
                correlation_id = %self.correlation_id,
                received = %conversation_id,
                "Ignoring frame message for another conversation"
            );
            return None;
        }

        Some(params)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const ORIGIN: &str = "https://shop.example.com";

    fn message(origin: &str, data: Value) -> FrameMessage {
        FrameMessage {
            origin: origin.to_string(),
            data,
        }
    }

    #[test]
    fn test_null_strings_are_dropped() {
        let params = CallbackParams {
            conversation_id: Some("c1".to_string()),
            payment_id: Some("null".to_string()),
            status: Some(String::new()),
            md_status: Some("undefined".to_string()),
        }
        .normalized();

        assert_eq!(params.conversation_id.as_deref(), Some("c1"));
        assert!(params.payment_id.is_none());
        assert!(params.status.is_none());
        assert!(params.md_status.is_none());
    }

    #[test]
    fn test_query_fields_win_over_body_fields() {
        let query = CallbackParams {
            conversation_id: Some("c1".to_string()),
            ..CallbackParams::default()
        };
        let body = CallbackParams {
            conversation_id: Some("c2".to_string()),
            payment_id: Some("p1".to_string()),
            ..CallbackParams::default()
        };

        let merged = query.or(body);
        assert_eq!(merged.conversation_id.as_deref(), Some("c1"));
        assert_eq!(merged.payment_id.as_deref(), Some("p1"));
        assert!(merged.has_identifiers());
    }

    #[test]
    fn test_callback_url_encodes_present_fields_only() {
        let params = CallbackParams {
            conversation_id: Some("c 1".to_string()),
            payment_id: Some("p1".to_string()),
            status: None,
            md_status: Some("1".to_string()),
        };

        assert_eq!(
            params.callback_url("https://shop.example.com/"),
            "https://shop.example.com/payment-callback?conversationId=c+1&paymentId=p1&mdStatus=1"
        );
        assert_eq!(
            CallbackParams::default().callback_url("https://shop.example.com"),
            "https://shop.example.com/payment-callback"
        );
    }

    #[test]
    fn test_from_json_accepts_numeric_md_status() {
        let params = CallbackParams::from_json(&json!({"paymentId": "p1", "mdStatus": 1}));
        assert_eq!(params.md_status.as_deref(), Some("1"));
    }

    #[test]
    fn test_listener_accepts_matching_message() {
        let listener = MessageListener::new(ORIGIN, "c1");
        let params = listener
            .accept(&message(
                ORIGIN,
                json!({"type": "PAYMENT_CALLBACK", "mdStatus": "1", "paymentId": "p123"}),
            ))
            .unwrap();

        assert_eq!(params.payment_id.as_deref(), Some("p123"));
        assert_eq!(params.md_status.as_deref(), Some("1"));
    }

    #[test]
    fn test_listener_rejects_foreign_origin() {
        let listener = MessageListener::new(ORIGIN, "c1");
        let result = listener.accept(&message(
            "https://evil.example.net",
            json!({"type": "PAYMENT_CALLBACK", "paymentId": "p123"}),
        ));
        assert!(result.is_none());
    }

    #[test]
    fn test_listener_rejects_other_types_and_conversations() {
        let listener = MessageListener::new(ORIGIN, "c1");
        assert!(
            listener
                .accept(&message(ORIGIN, json!({"type": "RESIZE"})))
                .is_none()
        );
        assert!(
            listener
                .accept(&message(
                    ORIGIN,
                    json!({"type": "PAYMENT_CALLBACK", "conversationId": "c2"})
                ))
                .is_none()
        );
    }
}
