//! Shopping cart lines.
//!
//! A line is identified by its product, size and color; adding the same
//! combination again merges quantities instead of creating a second line.
//! Quantities never drop to zero: setting a line to zero removes it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Errors raised by cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A line was added with a quantity of zero.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// The referenced line does not exist.
    #[error("cart line not found: {0}")]
    LineNotFound(String),
    /// The cart total would exceed what a decimal amount can hold.
    #[error("cart total is too large")]
    AmountTooLarge,
}

/// One product/size/color combination in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: u32,
}

impl CartLine {
    /// Price of the whole line (unit price × quantity), saturating at
    /// `Decimal::MAX`. Carts built through [`Cart::add`] never saturate.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }

    /// Price of the whole line, or `None` on overflow.
    #[must_use]
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// Human-readable variant label stored on the order item.
    #[must_use]
    pub fn variant_description(&self) -> Option<String> {
        match (&self.size, &self.color) {
            (Some(size), Some(color)) => Some(format!("Size: {size}, Color: {color}")),
            (Some(size), None) => Some(format!("Size: {size}")),
            (None, Some(color)) => Some(format!("Color: {color}")),
            (None, None) => None,
        }
    }

    /// Stable key used by cart update/remove requests.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.product_id,
            self.size.as_deref().unwrap_or_default(),
            self.color.as_deref().unwrap_or_default()
        )
    }

    fn same_variant(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.size == other.size && self.color == other.color
    }
}

/// The customer's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create a cart from existing lines, dropping any zero-quantity line.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self {
            lines: lines.into_iter().filter(|l| l.quantity > 0).collect(),
        }
    }

    /// Add a line, merging with an existing line of the same variant.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ZeroQuantity` if the line's quantity is zero.
    /// Returns `CartError::AmountTooLarge` if the cart total would overflow;
    /// the cart is left unchanged.
    pub fn add(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        let mut next = self.clone();
        if let Some(existing) = next.lines.iter_mut().find(|l| l.same_variant(&line)) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            next.lines.push(line);
        }
        self.replace_with(next)
    }

    /// Set the quantity of a line. A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if no line has the given key.
    /// Returns `CartError::AmountTooLarge` if the cart total would overflow.
    pub fn set_quantity(&mut self, key: &str, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(key);
        }

        let mut next = self.clone();
        let line = next
            .lines
            .iter_mut()
            .find(|l| l.key() == key)
            .ok_or_else(|| CartError::LineNotFound(key.to_owned()))?;
        line.quantity = quantity;
        self.replace_with(next)
    }

    fn replace_with(&mut self, next: Self) -> Result<(), CartError> {
        if next.checked_subtotal().is_none() {
            return Err(CartError::AmountTooLarge);
        }
        *self = next;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if no line has the given key.
    pub fn remove(&mut self, key: &str) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.key() != key);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound(key.to_owned()));
        }
        Ok(())
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |count, l| count.saturating_add(l.quantity))
    }

    /// Sum of all line totals, saturating at `Decimal::MAX`.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Sum of all line totals, or `None` on overflow.
    #[must_use]
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, l| sum.checked_add(l.checked_line_total()?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn line(size: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new("BG-1"),
            title: "Linen Shirt".to_string(),
            unit_price: Decimal::new(4999, 2),
            image_url: None,
            color: None,
            size: Some(size.to_string()),
            quantity,
        }
    }

    #[test]
    fn test_add_merges_same_variant() {
        let mut cart = Cart::default();
        cart.add(line("M", 1)).unwrap();
        cart.add(line("M", 2)).unwrap();
        cart.add(line("L", 1)).unwrap();

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_add_rejects_zero_quantity() {
        let mut cart = Cart::default();
        assert_eq!(cart.add(line("M", 0)), Err(CartError::ZeroQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = Cart::default();
        cart.add(line("M", 2)).unwrap();
        let key = cart.lines()[0].key();

        cart.set_quantity(&key, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_unknown_line() {
        let mut cart = Cart::default();
        assert!(matches!(
            cart.set_quantity("missing", 3),
            Err(CartError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_subtotal() {
        let mut cart = Cart::default();
        cart.add(line("M", 2)).unwrap();
        cart.add(line("S", 1)).unwrap();
        assert_eq!(cart.subtotal(), Decimal::new(14997, 2));
    }

    #[test]
    fn test_add_rejects_line_whose_total_overflows() {
        let mut cart = Cart::default();
        cart.add(line("S", 1)).unwrap();

        let mut huge = line("M", 2);
        huge.unit_price = Decimal::MAX;
        assert_eq!(cart.add(huge), Err(CartError::AmountTooLarge));
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.subtotal(), Decimal::new(4999, 2));
    }

    #[test]
    fn test_set_quantity_rejects_overflowing_total() {
        let mut cart = Cart::default();
        let mut pricey = line("M", 1);
        pricey.unit_price = Decimal::MAX;
        cart.add(pricey).unwrap();
        let key = cart.lines()[0].key();

        assert_eq!(cart.set_quantity(&key, 3), Err(CartError::AmountTooLarge));
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn test_totals_saturate_instead_of_panicking() {
        let mut huge = line("M", 5);
        huge.unit_price = Decimal::MAX;
        assert_eq!(huge.checked_line_total(), None);
        assert_eq!(huge.line_total(), Decimal::MAX);

        let cart = Cart::from_lines(vec![huge.clone(), huge]);
        assert_eq!(cart.checked_subtotal(), None);
        assert_eq!(cart.subtotal(), Decimal::MAX);
    }

    #[test]
    fn test_from_lines_drops_zero_quantity() {
        let cart = Cart::from_lines(vec![line("M", 0), line("L", 1)]);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_variant_description() {
        let mut l = line("M", 1);
        assert_eq!(l.variant_description().as_deref(), Some("Size: M"));
        l.size = None;
        assert_eq!(l.variant_description(), None);
    }
}
