//! Invoice lock service: the terminal step of the finalize flow.
//!
//! The service issues exactly one conditional update scoped by
//! `(invoice_id, user_id)`, setting `is_locked = true` and stamping
//! `finalized_at` (an ISO-8601 string, preserved on repeat locking). It
//! performs no status gating itself; callers gate before invoking, and the
//! `prevent_locked_invoice_update` trigger enforces content immutability
//! independently of any application code path.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::traits::store::AppStore;

pub struct InvoiceLockService {
    store: Arc<dyn AppStore>,
}

impl InvoiceLockService {
    pub fn new(store: Arc<dyn AppStore>) -> Self {
        Self { store }
    }

    /// Lock an invoice after its email went out.
    ///
    /// Idempotent in effect: re-locking keeps the original `finalized_at`.
    /// Any storage failure surfaces as "Failed to lock invoice: <reason>"
    /// with no partial state change (single statement, atomic at the
    /// storage layer).
    pub async fn lock_after_send(&self, invoice_id: Uuid, user_id: Uuid) -> Result<()> {
        let finalized_at = Utc::now().to_rfc3339();
        self.store
            .lock_invoice(invoice_id, user_id, &finalized_at)
            .await
            .map_err(|e| ApiError::storage(format!("Failed to lock invoice: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoices::InvoiceStatus;
    use crate::store::memory::InMemoryStore;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_lock_issues_single_update() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let client = fixtures::seed_client(&store, user_id).await;
        let invoice = fixtures::seed_invoice(&store, user_id, client.id).await;

        let service = InvoiceLockService::new(store.clone());
        service.lock_after_send(invoice.id, user_id).await.unwrap();

        assert_eq!(store.lock_calls(), 1);
        let locked = store.find_invoice(invoice.id, user_id).await.unwrap().unwrap();
        assert!(locked.is_locked);
        let finalized_at = locked.finalized_at.expect("finalized_at set at lock time");
        // string-typed ISO-8601 timestamp
        assert!(chrono::DateTime::parse_from_rfc3339(&finalized_at).is_ok());
    }

    #[tokio::test]
    async fn test_relocking_keeps_first_timestamp() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let client = fixtures::seed_client(&store, user_id).await;
        let invoice = fixtures::seed_invoice(&store, user_id, client.id).await;

        let service = InvoiceLockService::new(store.clone());
        service.lock_after_send(invoice.id, user_id).await.unwrap();
        let first = store
            .find_invoice(invoice.id, user_id)
            .await
            .unwrap()
            .unwrap()
            .finalized_at;

        service.lock_after_send(invoice.id, user_id).await.unwrap();
        let second = store
            .find_invoice(invoice.id, user_id)
            .await
            .unwrap()
            .unwrap()
            .finalized_at;

        assert_eq!(first, second);
        assert_eq!(store.lock_calls(), 2);
    }

    #[tokio::test]
    async fn test_lock_error_is_descriptive() {
        let store = Arc::new(InMemoryStore::new());
        let service = InvoiceLockService::new(store.clone());

        // No such invoice: the conditional update matches nothing.
        let err = service
            .lock_after_send(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to lock invoice"));
    }

    #[tokio::test]
    async fn test_lock_does_not_gate_status() {
        // The service locks regardless of status; gating is the caller's
        // responsibility in the finalize flow.
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        let client = fixtures::seed_client(&store, user_id).await;
        let invoice = fixtures::seed_invoice(&store, user_id, client.id).await;
        store
            .set_invoice_status(invoice.id, user_id, InvoiceStatus::Paid)
            .await
            .unwrap();

        let service = InvoiceLockService::new(store.clone());
        service.lock_after_send(invoice.id, user_id).await.unwrap();
        assert!(store
            .find_invoice(invoice.id, user_id)
            .await
            .unwrap()
            .unwrap()
            .is_locked);
    }
}
