//! Core types for Vitrin.
//!
//! This module provides type-safe wrappers for the checkout domain.

pub mod address;
pub mod card;
pub mod cart;
pub mod contact;
pub mod id;
pub mod order;
pub mod price;
pub mod status;

pub use address::{AddressError, ShippingAddress};
pub use card::{CardDetails, CardError};
pub use cart::{Cart, CartError, CartLine};
pub use contact::{Email, EmailError, PhoneNumber};
pub use id::*;
pub use order::{NewOrder, NewOrderItem, Order, OrderDraft, OrderItem};
pub use price::{CurrencyCode, Price, format_amount};
pub use status::OrderStatus;
