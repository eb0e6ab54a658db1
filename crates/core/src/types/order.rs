//! Orders and the draft they are minted from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::address::ShippingAddress;
use super::cart::CartLine;
use super::id::{OrderId, OrderItemId, ProductId, UserId};
use super::status::OrderStatus;

/// Everything needed to create an order once payment is verified.
///
/// Snapshotted at checkout submission so later cart edits cannot change what
/// was paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub cart: Vec<CartLine>,
    pub shipping_address: ShippingAddress,
}

impl OrderDraft {
    /// Build a `processing` draft from the cart snapshot.
    #[must_use]
    pub fn new(user_id: UserId, cart: Vec<CartLine>, shipping_address: ShippingAddress) -> Self {
        let total_amount = cart
            .iter()
            .map(CartLine::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add);
        Self {
            user_id,
            status: OrderStatus::Processing,
            total_amount,
            cart,
            shipping_address,
        }
    }

    /// Order row to insert for this draft once the gateway verified `payment_id`.
    #[must_use]
    pub fn to_new_order(&self, payment_id: &str, conversation_id: &str) -> NewOrder {
        NewOrder {
            user_id: self.user_id,
            status: self.status,
            total_amount: self.total_amount,
            shipping_address: self.shipping_address.clone(),
            payment_id: payment_id.to_owned(),
            conversation_id: conversation_id.to_owned(),
        }
    }

    /// One order item per cart line.
    #[must_use]
    pub fn to_new_items(&self) -> Vec<NewOrderItem> {
        self.cart.iter().map(NewOrderItem::from).collect()
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_id: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for inserting an order row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_id: String,
    pub conversation_id: String,
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub variant_description: Option<String>,
    pub image_url: Option<String>,
}

/// Parameters for inserting an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub variant_description: Option<String>,
    pub image_url: Option<String>,
}

impl From<&CartLine> for NewOrderItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            product_name: line.title.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            variant_description: line.variant_description(),
            image_url: line.image_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(size: &str, quantity: u32, cents: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(format!("BG-{size}")),
            title: "Wool Coat".to_string(),
            unit_price: Decimal::new(cents, 2),
            image_url: Some("https://cdn.example.com/coat.jpg".to_string()),
            color: None,
            size: Some(size.to_string()),
            quantity,
        }
    }

    #[test]
    fn test_draft_total_is_cart_sum() {
        let draft = OrderDraft::new(
            UserId::new(7),
            vec![line("M", 2, 10_000), line("L", 1, 5_050)],
            ShippingAddress::default(),
        );
        assert_eq!(draft.total_amount, Decimal::new(25_050, 2));
        assert_eq!(draft.status, OrderStatus::Processing);
    }

    #[test]
    fn test_draft_produces_one_item_per_line() {
        let draft = OrderDraft::new(
            UserId::new(7),
            vec![line("M", 2, 10_000), line("L", 1, 5_050)],
            ShippingAddress::default(),
        );
        let items = draft.to_new_items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.quantity == 2
            && i.variant_description.as_deref() == Some("Size: M")));
    }

    #[test]
    fn test_new_order_carries_payment_reference() {
        let draft = OrderDraft::new(UserId::new(7), vec![], ShippingAddress::default());
        let order = draft.to_new_order("p123", "c456");
        assert_eq!(order.payment_id, "p123");
        assert_eq!(order.conversation_id, "c456");
        assert_eq!(order.status, OrderStatus::Processing);
    }
}
