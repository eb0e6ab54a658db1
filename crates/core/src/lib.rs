//! Vitrin Core - Shared domain types for the storefront checkout.
//!
//! This crate provides the types shared by the storefront, the CLI and the
//! integration tests:
//! - cart lines and the quantity rules that govern them
//! - shipping addresses and card details, with checkout-form validation
//! - order drafts, orders and order items
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, money, contact details, cart, address, card and order types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
