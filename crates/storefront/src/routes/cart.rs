//! Cart route handlers.
//!
//! The cart lives in the session. Lines are added by the product pages with
//! the product's catalog data; quantities merge per product/size/color.

use axum::{Form, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use vitrin_core::{Cart, CartError, CartLine, ProductId, format_amount};

use crate::checkout::{CartStore, SessionCartStore};
use crate::error::{AppError, Result};

/// Cart line display data.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub key: String,
    pub product_id: String,
    pub title: String,
    pub variant: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            key: line.key(),
            product_id: line.product_id.to_string(),
            title: line.title.clone(),
            variant: line.variant_description(),
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            unit_price: format_amount(line.unit_price),
            line_total: format_amount(line.line_total()),
        }
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines().iter().map(CartLineView::from).collect(),
            item_count: cart.item_count(),
            subtotal: format_amount(cart.subtotal()),
        }
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub title: String,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: Option<u32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub key: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub key: String,
}

fn cart_error(err: CartError) -> AppError {
    match err {
        CartError::LineNotFound(_) => AppError::NotFound(err.to_string()),
        CartError::ZeroQuantity | CartError::AmountTooLarge => {
            AppError::BadRequest(err.to_string())
        }
    }
}

/// Blank optional form fields count as absent.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Show the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = SessionCartStore::new(session).load().await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add a line to the cart.
#[instrument(skip(session))]
pub async fn add(session: Session, Form(form): Form<AddToCartForm>) -> Result<Json<CartView>> {
    if form.unit_price.is_sign_negative() {
        return Err(AppError::BadRequest("unit price cannot be negative".to_string()));
    }

    let store = SessionCartStore::new(session);
    let mut cart = store.load().await?;
    cart.add(CartLine {
        product_id: ProductId::new(form.product_id),
        title: form.title,
        unit_price: form.unit_price,
        image_url: non_blank(form.image_url),
        color: non_blank(form.color),
        size: non_blank(form.size),
        quantity: form.quantity.unwrap_or(1),
    })
    .map_err(cart_error)?;
    store.save(&cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// Change a line's quantity; zero removes it.
#[instrument(skip(session))]
pub async fn update(
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Json<CartView>> {
    let store = SessionCartStore::new(session);
    let mut cart = store.load().await?;
    cart.set_quantity(&form.key, form.quantity)
        .map_err(cart_error)?;
    store.save(&cart).await?;

    Ok(Json(CartView::from(&cart)))
}

/// Remove a line from the cart.
#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Json<CartView>> {
    let store = SessionCartStore::new(session);
    let mut cart = store.load().await?;
    cart.remove(&form.key).map_err(cart_error)?;
    store.save(&cart).await?;

    Ok(Json(CartView::from(&cart)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_view_formats_money_and_variant() {
        let cart = Cart::from_lines(vec![CartLine {
            product_id: ProductId::new("BG-1"),
            title: "Linen Shirt".to_string(),
            unit_price: Decimal::new(49_950, 2),
            image_url: None,
            color: Some("Blue".to_string()),
            size: Some("M".to_string()),
            quantity: 2,
        }]);

        let view = CartView::from(&cart);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.subtotal, "999.00");
        let line = view.lines.first();
        assert_eq!(line.map(|l| l.key.as_str()), Some("BG-1:M:Blue"));
        assert_eq!(
            line.and_then(|l| l.variant.as_deref()),
            Some("Size: M, Color: Blue")
        );
    }

    #[test]
    fn test_oversized_cart_total_is_a_bad_request() {
        let mut cart = Cart::default();
        let err = cart
            .add(CartLine {
                product_id: ProductId::new("BG-1"),
                title: "Linen Shirt".to_string(),
                unit_price: Decimal::MAX,
                image_url: None,
                color: None,
                size: Some("M".to_string()),
                quantity: 2,
            })
            .map_err(cart_error);

        assert!(matches!(err, Err(AppError::BadRequest(_))));
        assert_eq!(CartView::from(&cart).subtotal, format_amount(Decimal::ZERO));
    }

    #[test]
    fn test_blank_form_fields_are_dropped() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" M ".to_string())), Some("M".to_string()));
    }
}
