//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::checkout::{CheckoutError, StockShortage};
use crate::db::RepositoryError;
use crate::payment::PaymentError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Checkout flow failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment gateway could not be reached or answered unreadably.
    #[error("Payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    shortages: Vec<StockShortageBody>,
}

/// One itemized shortage in an error or stock-check body.
#[derive(Debug, Serialize)]
pub struct StockShortageBody {
    pub product_id: String,
    pub title: String,
    pub size: String,
    pub requested: u32,
    pub available: i32,
}

impl From<&StockShortage> for StockShortageBody {
    fn from(shortage: &StockShortage) -> Self {
        Self {
            product_id: shortage.product_id.to_string(),
            title: shortage.title.clone(),
            size: shortage.size.clone(),
            requested: shortage.requested,
            available: shortage.available,
        }
    }
}

impl AppError {
    /// Whether this is a server-side failure worth reporting.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) => match err {
                CheckoutError::InvalidAddress(_)
                | CheckoutError::InvalidCard(_)
                | CheckoutError::EmptyCart => StatusCode::UNPROCESSABLE_ENTITY,
                CheckoutError::InsufficientStock(_) | CheckoutError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                CheckoutError::GatewayRejected(_) | CheckoutError::VerificationFailed(_) => {
                    StatusCode::PAYMENT_REQUIRED
                }
                CheckoutError::PendingPaymentMissing | CheckoutError::PendingPaymentExpired => {
                    StatusCode::GONE
                }
                CheckoutError::Payment(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repository(_) | CheckoutError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the customer.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::Payment(_) => "Payment service is unavailable, please try again".to_string(),
            Self::Checkout(err) if err.is_customer_facing() => err.to_string(),
            Self::Checkout(CheckoutError::InvalidTransition { .. }) => {
                "This checkout step is no longer valid, please start again".to_string()
            }
            Self::Checkout(CheckoutError::Payment(_)) => {
                "Payment service is unavailable, please try again".to_string()
            }
            Self::Checkout(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Capture server errors to Sentry; client errors are only logged.
    pub fn report(&self) {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.report();

        let shortages: Vec<StockShortageBody> = match &self {
            Self::Checkout(err) => err.shortages().iter().map(Into::into).collect(),
            _ => Vec::new(),
        };

        let body = ErrorBody {
            error: self.public_message(),
            shortages,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the session identifies the customer so payment errors are
/// associated with them.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for checkout steps.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use vitrin_core::ProductId;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 12".to_string());
        assert_eq!(err.to_string(), "Not found: order 12");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(CheckoutError::GatewayRejected("insufficient funds".to_string()).into()),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            get_status(CheckoutError::PendingPaymentMissing.into()),
            StatusCode::GONE
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::from(CheckoutError::Storage("connection reset".to_string()));
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.is_server_error());
    }

    #[test]
    fn test_customer_facing_checkout_errors_keep_their_message() {
        let err = AppError::from(CheckoutError::InsufficientStock(vec![StockShortage {
            product_id: ProductId::new("BG-1"),
            title: "Linen Shirt".to_string(),
            size: "L".to_string(),
            requested: 3,
            available: 1,
        }]));
        assert!(err.public_message().contains("1 in stock"));
        assert!(!err.is_server_error());
    }
}
