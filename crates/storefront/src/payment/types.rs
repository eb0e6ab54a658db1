//! Gateway wire types.
//!
//! Field names follow the gateway's camelCase JSON contract.

use serde::{Deserialize, Serialize};

/// Card block of an initialize request.
///
/// Holds the raw card number only for the lifetime of one request.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCard {
    pub card_holder_name: String,
    pub card_number: String,
    pub expire_month: String,
    pub expire_year: String,
    pub cvc: String,
    pub register_card: u8,
}

impl std::fmt::Debug for PaymentCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentCard")
            .field("card_holder_name", &self.card_holder_name)
            .field("card_number", &"[REDACTED]")
            .field("expire_month", &self.expire_month)
            .field("expire_year", &self.expire_year)
            .field("cvc", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buyer {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub gsm_number: String,
    pub email: String,
    pub identity_number: String,
    pub registration_address: String,
    pub ip: String,
    pub city: String,
    pub country: String,
    pub zip_code: String,
}

/// Shipping or billing address block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBlock {
    pub contact_name: String,
    pub city: String,
    pub country: String,
    pub address: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketItem {
    pub id: String,
    pub name: String,
    pub category1: String,
    pub item_type: String,
    pub price: String,
}

/// Body of `POST /payment/3dsecure/initialize`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub locale: String,
    pub conversation_id: String,
    pub price: String,
    pub paid_price: String,
    pub currency: String,
    pub basket_id: String,
    pub payment_group: String,
    pub callback_url: String,
    pub payment_card: PaymentCard,
    pub buyer: Buyer,
    pub shipping_address: AddressBlock,
    pub billing_address: AddressBlock,
    pub basket_items: Vec<BasketItem>,
}

/// Response of `POST /payment/3dsecure/initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializeResponse {
    pub status: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub conversation_id: Option<String>,
    #[serde(rename = "threeDSHtmlContent")]
    pub three_ds_html_content: Option<String>,
}

impl InitializeResponse {
    /// Whether the gateway accepted the request.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Body of `POST /payment/3dsecure/auth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub locale: String,
    pub conversation_id: String,
    pub payment_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_request_serializes_in_gateway_field_order() {
        let body = serde_json::to_string(&AuthRequest {
            locale: "tr".to_string(),
            conversation_id: "c1".to_string(),
            payment_id: "p1".to_string(),
        })
        .unwrap();
        assert_eq!(body, r#"{"locale":"tr","conversationId":"c1","paymentId":"p1"}"#);
    }

    #[test]
    fn test_initialize_response_tolerates_missing_fields() {
        let response: InitializeResponse = serde_json::from_str(
            r#"{"status":"failure","errorCode":"10051","errorMessage":"insufficient funds"}"#,
        )
        .unwrap();
        assert!(!response.is_success());
        assert_eq!(response.error_message.as_deref(), Some("insufficient funds"));
        assert!(response.three_ds_html_content.is_none());
    }

    #[test]
    fn test_initialize_response_reads_html_content() {
        let response: InitializeResponse = serde_json::from_str(
            r#"{"status":"success","conversationId":"c1","threeDSHtmlContent":"PGh0bWw+"}"#,
        )
        .unwrap();
        assert!(response.is_success());
        assert_eq!(response.three_ds_html_content.as_deref(), Some("PGh0bWw+"));
    }

    #[test]
    fn test_payment_card_debug_redacts_number() {
        let card = PaymentCard {
            card_holder_name: "Ada Lovelace".to_string(),
            card_number: "5528790000000008".to_string(),
            expire_month: "12".to_string(),
            expire_year: "2030".to_string(),
            cvc: "123".to_string(),
            register_card: 0,
        };
        let debug = format!("{card:?}");
        assert!(!debug.contains("5528790000000008"));
        assert!(!debug.contains("123\""));
    }
}
