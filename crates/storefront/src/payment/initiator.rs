//! Payment initiation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use vitrin_core::{
    CardDetails, CartLine, CurrencyCode, Email, PhoneNumber, ShippingAddress, UserId,
    format_amount,
};

use super::types::{AddressBlock, BasketItem, Buyer, InitializeRequest, PaymentCard};
use super::{PaymentError, PaymentGateway};
use crate::config::IyzicoConfig;

const COUNTRY: &str = "Turkey";
const FALLBACK_PHONE: &str = "5555555555";

/// Fixed per-market values sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSettings {
    pub locale: String,
    pub currency: CurrencyCode,
    pub buyer_identity_number: String,
    pub basket_category: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            locale: "tr".to_string(),
            currency: CurrencyCode::TRY,
            buyer_identity_number: "11111111111".to_string(),
            basket_category: "Clothing".to_string(),
        }
    }
}

impl From<&IyzicoConfig> for PaymentSettings {
    fn from(config: &IyzicoConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            currency: config.currency,
            buyer_identity_number: config.buyer_identity_number.clone(),
            basket_category: config.basket_category.clone(),
        }
    }
}

/// Who is paying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyerInfo {
    pub user_id: UserId,
    pub email: Email,
    /// Client IP address as seen by the storefront.
    pub ip: String,
}

/// Everything one initialize call needs.
#[derive(Debug, Clone, Copy)]
pub struct PaymentRequest<'a> {
    pub card: &'a CardDetails,
    pub buyer: &'a BuyerInfo,
    pub lines: &'a [CartLine],
    pub total_amount: Decimal,
    pub callback_url: &'a str,
    pub shipping_address: &'a ShippingAddress,
}

/// The bank challenge to show the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Conversation id to verify against later.
    pub correlation_id: String,
    /// HTML document to render in the authentication frame.
    pub auth_document: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiationOutcome {
    Challenge(AuthChallenge),
    /// The gateway declined; the message is shown to the customer as-is.
    Rejected { error_message: String },
}

pub struct PaymentInitiator<'a, G> {
    gateway: &'a G,
    settings: &'a PaymentSettings,
}

impl<'a, G: PaymentGateway> PaymentInitiator<'a, G> {
    #[must_use]
    pub const fn new(gateway: &'a G, settings: &'a PaymentSettings) -> Self {
        Self { gateway, settings }
    }

    /// Start 3-D Secure for `request`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` when the gateway cannot be reached or answers
    /// with something unreadable. A declined request is `Ok(Rejected)`.
    #[instrument(skip(self, request), fields(user_id = %request.buyer.user_id, correlation_id))]
    pub async fn initialize_3ds(
        &self,
        request: PaymentRequest<'_>,
    ) -> Result<InitiationOutcome, PaymentError> {
        let conversation_id = Uuid::new_v4().simple().to_string();
        tracing::Span::current().record("correlation_id", conversation_id.as_str());

        let payload = self.build_request(&conversation_id, &request);
        let response = self.gateway.initialize_3ds(&payload).await?;

        let html = response
            .three_ds_html_content
            .as_deref()
            .filter(|html| !html.trim().is_empty());

        match html {
            Some(html) if response.is_success() => {
                let correlation_id = response
                    .conversation_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or(conversation_id);
                info!(correlation_id = %correlation_id, "3-D Secure challenge issued");
                Ok(InitiationOutcome::Challenge(AuthChallenge {
                    correlation_id,
                    auth_document: decode_auth_document(html),
                }))
            }
            _ => {
                let error_message = response
                    .error_message
                    .unwrap_or_else(|| "Unknown error".to_string());
                warn!(
                    error_code = ?response.error_code,
                    error_message = %error_message,
                    "Gateway rejected 3-D Secure initialize"
                );
                Ok(InitiationOutcome::Rejected { error_message })
            }
        }
    }

    /// Build the gateway payload for one attempt.
    #[must_use]
    pub fn build_request(
        &self,
        conversation_id: &str,
        request: &PaymentRequest<'_>,
    ) -> InitializeRequest {
        let address = request.shipping_address;
        let (name, surname) = address.name_parts();
        let contact_name = address.full_name.trim().to_string();
        let zip_code = address.zip_code_or_default().to_string();
        let gsm_number = PhoneNumber::normalize(&address.phone)
            .or_else(|| PhoneNumber::normalize(FALLBACK_PHONE))
            .map(|p| p.as_str().to_string())
            .unwrap_or_default();
        let amount = format_amount(request.total_amount);

        let address_block = AddressBlock {
            contact_name,
            city: address.city.clone(),
            country: COUNTRY.to_string(),
            address: address.address_line.clone(),
            zip_code: zip_code.clone(),
        };

        let card = request.card;

        InitializeRequest {
            locale: self.settings.locale.clone(),
            conversation_id: conversation_id.to_string(),
            price: amount.clone(),
            paid_price: amount,
            currency: self.settings.currency.code().to_string(),
            basket_id: format!("B{conversation_id}"),
            payment_group: "PRODUCT".to_string(),
            callback_url: request.callback_url.to_string(),
            payment_card: PaymentCard {
                card_holder_name: card.holder_name().to_string(),
                card_number: card.number().to_string(),
                expire_month: card.expire_month().to_string(),
                expire_year: card.expire_year().to_string(),
                cvc: card.cvc().to_string(),
                register_card: 0,
            },
            buyer: Buyer {
                id: request.buyer.user_id.to_string(),
                name,
                surname,
                gsm_number,
                email: request.buyer.email.as_str().to_string(),
                identity_number: self.settings.buyer_identity_number.clone(),
                registration_address: address.address_line.clone(),
                ip: request.buyer.ip.clone(),
                city: address.city.clone(),
                country: COUNTRY.to_string(),
                zip_code,
            },
            shipping_address: address_block.clone(),
            billing_address: address_block,
            basket_items: request
                .lines
                .iter()
                .enumerate()
                .map(|(index, line)| self.basket_item(index, line))
                .collect(),
        }
    }

    fn basket_item(&self, index: usize, line: &CartLine) -> BasketItem {
        let name = match line.variant_description() {
            Some(variant) => format!("{} ({variant})", line.title),
            None => line.title.clone(),
        };

        BasketItem {
            id: format!("{}-{}", line.product_id, index + 1),
            name,
            category1: self.settings.basket_category.clone(),
            item_type: "PHYSICAL".to_string(),
            price: format_amount(line.line_total()),
        }
    }
}

/// Turn the gateway's `threeDSHtmlContent` into renderable HTML.
///
/// Content starting with `<` is HTML already. Anything else is tried as
/// base64 and used only if the decoded text looks like an HTML document;
/// otherwise the raw content is used.
#[must_use]
pub fn decode_auth_document(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.starts_with('<') {
        return content.to_string();
    }

    let decoded = STANDARD
        .decode(trimmed)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    match decoded {
        Some(html) if looks_like_html(&html) => html,
        _ => {
            warn!("Authentication document is not base64 HTML, using raw content");
            content.to_string()
        }
    }
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    lower.contains("<html") || lower.contains("<!doctype")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Mutex;

    use super::super::types::{AuthRequest, InitializeResponse};
    use super::*;

    const PAGE: &str = "<!DOCTYPE html><html><body>bank</body></html>";

    struct FakeGateway {
        response: InitializeResponse,
        seen: Mutex<Vec<InitializeRequest>>,
    }

    impl FakeGateway {
        fn answering(response: InitializeResponse) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl PaymentGateway for FakeGateway {
        async fn initialize_3ds(
            &self,
            request: &InitializeRequest,
        ) -> Result<InitializeResponse, PaymentError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }

        async fn auth_3ds(&self, _request: &AuthRequest) -> Result<serde_json::Value, PaymentError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            label: "Home".to_string(),
            full_name: "Ayşe Nur Yılmaz".to_string(),
            phone: "0532 123 45 67".to_string(),
            address_line: "Bağdat Cad. 10".to_string(),
            city: "İstanbul".to_string(),
            district: "Kadıköy".to_string(),
            zip_code: String::new(),
        }
    }

    fn line(size: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: vitrin_core::ProductId::new("BG-1"),
            title: "Linen Shirt".to_string(),
            unit_price: Decimal::new(12_550, 2),
            image_url: None,
            color: None,
            size: Some(size.to_string()),
            quantity,
        }
    }

    fn buyer() -> BuyerInfo {
        BuyerInfo {
            user_id: UserId::new(9),
            email: Email::parse("ayse@example.com").unwrap(),
            ip: "10.0.0.1".to_string(),
        }
    }

    fn card() -> CardDetails {
        CardDetails::parse("Ayşe Yılmaz", "5528 7900 0000 0008", "12/30", "123").unwrap()
    }

    #[test]
    fn test_payload_follows_gateway_contract() {
        let gateway = FakeGateway::answering(InitializeResponse::default());
        let settings = PaymentSettings::default();
        let initiator = PaymentInitiator::new(&gateway, &settings);
        let (card, buyer, address) = (card(), buyer(), address());
        let lines = [line("M", 2), line("L", 1)];

        let payload = initiator.build_request(
            "c1",
            &PaymentRequest {
                card: &card,
                buyer: &buyer,
                lines: &lines,
                total_amount: Decimal::new(37_650, 2),
                callback_url: "https://shop.example.com/payment/3ds-return",
                shipping_address: &address,
            },
        );

        assert_eq!(payload.basket_id, "Bc1");
        assert_eq!(payload.price, "376.50");
        assert_eq!(payload.paid_price, "376.50");
        assert_eq!(payload.currency, "TRY");
        assert_eq!(payload.payment_card.card_number, "5528790000000008");
        assert_eq!(payload.payment_card.expire_year, "2030");
        assert_eq!(payload.buyer.name, "Ayşe");
        assert_eq!(payload.buyer.surname, "Nur Yılmaz");
        assert_eq!(payload.buyer.gsm_number, "+9005321234567");
        assert_eq!(payload.shipping_address.zip_code, "34000");
        assert_eq!(payload.billing_address, payload.shipping_address);
        assert_eq!(payload.basket_items.len(), 2);
        assert_eq!(payload.basket_items[0].price, "251.00");
        assert_eq!(payload.basket_items[0].item_type, "PHYSICAL");
    }

    #[tokio::test]
    async fn test_success_returns_challenge_with_decoded_document() {
        let gateway = FakeGateway::answering(InitializeResponse {
            status: "success".to_string(),
            conversation_id: Some("c-gw".to_string()),
            three_ds_html_content: Some(STANDARD.encode(PAGE)),
            ..InitializeResponse::default()
        });
        let settings = PaymentSettings::default();
        let initiator = PaymentInitiator::new(&gateway, &settings);
        let (card, buyer, address) = (card(), buyer(), address());
        let lines = [line("M", 1)];

        let outcome = initiator
            .initialize_3ds(PaymentRequest {
                card: &card,
                buyer: &buyer,
                lines: &lines,
                total_amount: Decimal::new(12_550, 2),
                callback_url: "https://shop.example.com/payment/3ds-return",
                shipping_address: &address,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InitiationOutcome::Challenge(AuthChallenge {
                correlation_id: "c-gw".to_string(),
                auth_document: PAGE.to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_failure_surfaces_gateway_message() {
        let gateway = FakeGateway::answering(InitializeResponse {
            status: "failure".to_string(),
            error_message: Some("insufficient funds".to_string()),
            ..InitializeResponse::default()
        });
        let settings = PaymentSettings::default();
        let initiator = PaymentInitiator::new(&gateway, &settings);
        let (card, buyer, address) = (card(), buyer(), address());

        let outcome = initiator
            .initialize_3ds(PaymentRequest {
                card: &card,
                buyer: &buyer,
                lines: &[],
                total_amount: Decimal::ZERO,
                callback_url: "https://shop.example.com/payment/3ds-return",
                shipping_address: &address,
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InitiationOutcome::Rejected {
                error_message: "insufficient funds".to_string()
            }
        );
    }

    #[test]
    fn test_decode_auth_document_variants() {
        assert_eq!(decode_auth_document(PAGE), PAGE);
        assert_eq!(decode_auth_document(&STANDARD.encode(PAGE)), PAGE);
        // Valid base64 that is not HTML stays raw.
        let not_html = STANDARD.encode("just text");
        assert_eq!(decode_auth_document(&not_html), not_html);
        assert_eq!(decode_auth_document("%%%not-base64"), "%%%not-base64");
    }
}
