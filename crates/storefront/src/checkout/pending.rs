//! Pending-payment store.
//!
//! Holds the order draft between the moment the gateway accepts a 3-D Secure
//! request and the moment the callback arrives. At most one entry exists per
//! customer session; saving overwrites the previous one.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use vitrin_core::OrderDraft;

use super::CheckoutError;
use crate::models::keys;

/// An order waiting for its payment to be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    /// Gateway conversation id to verify against.
    pub correlation_id: String,
    /// Snapshot of what the customer is paying for.
    pub order_draft: OrderDraft,
    pub created_at: DateTime<Utc>,
}

impl PendingPayment {
    #[must_use]
    pub fn new(correlation_id: impl Into<String>, order_draft: OrderDraft) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            order_draft,
            created_at: Utc::now(),
        }
    }

    /// Whether the entry is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(ttl).is_ok_and(|ttl| now - self.created_at > ttl)
    }
}

/// Durable holding area for the pending payment.
pub trait PendingPaymentStore: Send + Sync {
    /// Store `entry`, replacing any previous one.
    fn save(&self, entry: &PendingPayment) -> impl Future<Output = Result<(), CheckoutError>> + Send;

    fn load(&self) -> impl Future<Output = Result<Option<PendingPayment>, CheckoutError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), CheckoutError>> + Send;
}

/// Pending payment kept in the customer's session.
///
/// Sessions are stored in `PostgreSQL`, so the entry survives the full page
/// navigation the bank redirect causes.
#[derive(Debug, Clone)]
pub struct SessionPendingStore {
    session: Session,
}

impl SessionPendingStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl PendingPaymentStore for SessionPendingStore {
    async fn save(&self, entry: &PendingPayment) -> Result<(), CheckoutError> {
        self.session
            .insert(keys::PENDING_PAYMENT, entry)
            .await
            .map_err(|e| CheckoutError::Storage(e.to_string()))
    }

    async fn load(&self) -> Result<Option<PendingPayment>, CheckoutError> {
        self.session
            .get::<PendingPayment>(keys::PENDING_PAYMENT)
            .await
            .map_err(|e| CheckoutError::Storage(e.to_string()))
    }

    async fn clear(&self) -> Result<(), CheckoutError> {
        self.session
            .remove::<PendingPayment>(keys::PENDING_PAYMENT)
            .await
            .map(|_| ())
            .map_err(|e| CheckoutError::Storage(e.to_string()))
    }
}

/// In-process pending store for tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryPendingStore {
    entry: Mutex<Option<PendingPayment>>,
}

impl MemoryPendingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entry, without going through the async trait.
    #[must_use]
    pub fn snapshot(&self) -> Option<PendingPayment> {
        self.entry.lock().ok().and_then(|entry| entry.clone())
    }
}

impl PendingPaymentStore for MemoryPendingStore {
    async fn save(&self, entry: &PendingPayment) -> Result<(), CheckoutError> {
        let mut slot = self
            .entry
            .lock()
            .map_err(|e| CheckoutError::Storage(e.to_string()))?;
        *slot = Some(entry.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<PendingPayment>, CheckoutError> {
        Ok(self.snapshot())
    }

    async fn clear(&self) -> Result<(), CheckoutError> {
        let mut slot = self
            .entry
            .lock()
            .map_err(|e| CheckoutError::Storage(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}
