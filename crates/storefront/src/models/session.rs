//! Session-related types.
//!
//! Types stored in the session for the signed-in customer.

use serde::{Deserialize, Serialize};

use vitrin_core::{Email, UserId};

/// Session-stored user identity.
///
/// Written by the identity provider integration at sign-in. Checkout reads
/// it to fill the buyer block sent to the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name from the customer profile, if any.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Phone number from the customer profile, if any.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the cart lines.
    pub const CART: &str = "cart";

    /// Key for the payment awaiting 3-D Secure authentication.
    pub const PENDING_PAYMENT: &str = "pending_payment";
}
