//! Order history and confirmation routes.

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use vitrin_core::{Order, OrderId, OrderItem, ShippingAddress, format_amount};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Order item display data.
#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: String,
    pub product_name: String,
    pub variant: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
}

/// Order confirmation data.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: i32,
    pub status: String,
    pub total_amount: String,
    pub payment_id: String,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            variant: item.variant_description.clone(),
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            unit_price: format_amount(item.unit_price),
        }
    }
}

impl OrderView {
    fn new(order: Order, items: &[OrderItem]) -> Self {
        Self {
            id: order.id.as_i32(),
            status: order.status.to_string(),
            total_amount: format_amount(order.total_amount),
            payment_id: order.payment_id,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
            items: items.iter().map(OrderItemView::from).collect(),
        }
    }
}

/// One row of the order history.
#[derive(Debug, Serialize)]
pub struct OrderSummaryView {
    pub id: i32,
    pub status: String,
    pub total_amount: String,
    pub created_at: DateTime<Utc>,
    pub item_count: u32,
    pub items: Vec<OrderItemView>,
}

impl OrderSummaryView {
    /// Pair each order with its items. `orders` keeps its order.
    fn collect(orders: Vec<Order>, items: &[OrderItem]) -> Vec<Self> {
        orders
            .into_iter()
            .map(|order| {
                let items: Vec<OrderItemView> = items
                    .iter()
                    .filter(|item| item.order_id == order.id)
                    .map(OrderItemView::from)
                    .collect();
                Self {
                    id: order.id.as_i32(),
                    status: order.status.to_string(),
                    total_amount: format_amount(order.total_amount),
                    created_at: order.created_at,
                    item_count: items.iter().map(|item| item.quantity).sum(),
                    items,
                }
            })
            .collect()
    }
}

/// List the signed-in customer's orders, newest first.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderSummaryView>>> {
    let repo = OrderRepository::new(state.pool());

    let orders = repo.list_for_user(user.id).await?;
    let ids: Vec<OrderId> = orders.iter().map(|order| order.id).collect();
    let items = repo.list_items_for_orders(&ids).await?;

    Ok(Json(OrderSummaryView::collect(orders, &items)))
}

/// Show one of the signed-in customer's orders.
#[instrument(skip_all, fields(user_id = %user.id, order_id = id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<OrderView>> {
    let order_id = OrderId::new(id);
    let repo = OrderRepository::new(state.pool());

    let order = repo
        .get_for_user(order_id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
    let items = repo.list_items(order_id).await?;

    Ok(Json(OrderView::new(order, &items)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use vitrin_core::{OrderItemId, OrderStatus, ProductId, UserId};

    use super::*;

    fn order(id: i32, day: u32) -> Order {
        Order {
            id: OrderId::new(id),
            user_id: UserId::new(7),
            status: OrderStatus::Processing,
            total_amount: Decimal::new(150_000, 2),
            shipping_address: ShippingAddress::default(),
            payment_id: format!("p{id}"),
            conversation_id: format!("c{id}"),
            created_at: Utc.with_ymd_and_hms(2026, 10, day, 12, 0, 0).unwrap(),
        }
    }

    fn item(id: i32, order_id: i32, quantity: u32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(order_id),
            product_id: ProductId::new("BG-1"),
            product_name: "Linen Shirt".to_string(),
            quantity,
            unit_price: Decimal::new(50_000, 2),
            variant_description: Some("M".to_string()),
            image_url: None,
        }
    }

    #[test]
    fn test_summaries_keep_order_and_group_items() {
        let orders = vec![order(2, 3), order(1, 1)];
        let items = vec![item(1, 1, 1), item(2, 2, 2), item(3, 2, 1)];

        let views = OrderSummaryView::collect(orders, &items);

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, 2);
        assert_eq!(views[0].items.len(), 2);
        assert_eq!(views[0].item_count, 3);
        assert_eq!(views[0].total_amount, format_amount(Decimal::new(150_000, 2)));
        assert_eq!(views[0].status, "processing");
        assert_eq!(views[1].id, 1);
        assert_eq!(views[1].item_count, 1);
    }

    #[test]
    fn test_order_without_items_has_empty_summary() {
        let views = OrderSummaryView::collect(vec![order(5, 2)], &[]);
        assert_eq!(views[0].item_count, 0);
        assert!(views[0].items.is_empty());
    }
}
