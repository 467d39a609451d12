//! Test doubles and fixtures.
//!
//! Used by the crate's own tests and by integration tests: a manual clock
//! for stepping through rate-limit windows, a recording mailer standing in
//! for the email provider, and fixture helpers seeding the in-memory
//! store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{ApiError, Result};
use crate::traits::clock::Clock;
use crate::traits::mailer::{Email, Mailer};

/// A clock that only moves when told to.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().expect("clock mutex poisoned") += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().expect("clock mutex poisoned")
    }
}

/// A mailer that records sends instead of talking to a provider.
///
/// `call_count` counts provider calls (including failed ones) so tests can
/// assert the one-call-per-accepted-request contract; `sent` holds the
/// messages the "provider" accepted.
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent sends fail as if the provider were down.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::Relaxed);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl Default for RecordingMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return Err(ApiError::EmailDelivery("simulated provider outage".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.fail.load(Ordering::Relaxed)
    }
}

pub mod fixtures {
    use uuid::Uuid;

    use crate::clients::{Client, ClientInput};
    use crate::documents::Position;
    use crate::email::{SenderIdentity, SenderIdentityInput};
    use crate::invoices::{Invoice, InvoiceInput};
    use crate::store::memory::InMemoryStore;
    use crate::traits::store::AppStore;

    pub fn client_input() -> ClientInput {
        ClientInput {
            name: "Acme GmbH".to_string(),
            email: Some("billing@acme.example".to_string()),
            address_lines: vec!["Musterweg 1".to_string(), "10115 Berlin".to_string()],
        }
    }

    pub fn invoice_input(client_id: Uuid) -> InvoiceInput {
        InvoiceInput {
            client_id,
            project_id: None,
            number: Some("2026-0001".to_string()),
            issue_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()),
            due_date: Some(chrono::NaiveDate::from_ymd_opt(2026, 8, 15).unwrap()),
            positions: vec![Position {
                description: "Consulting".to_string(),
                quantity: 8,
                unit_price_cents: 12_000,
            }],
            currency: "EUR".to_string(),
        }
    }

    pub async fn seed_client(store: &InMemoryStore, user_id: Uuid) -> Client {
        store
            .insert_client(user_id, client_input())
            .await
            .expect("seed client")
    }

    pub async fn seed_invoice(store: &InMemoryStore, user_id: Uuid, client_id: Uuid) -> Invoice {
        store
            .insert_invoice(user_id, invoice_input(client_id))
            .await
            .expect("seed invoice")
    }

    pub async fn seed_identity(store: &InMemoryStore, user_id: Uuid) -> SenderIdentity {
        store
            .insert_sender_identity(
                user_id,
                SenderIdentityInput {
                    email: "mara@studio.example".to_string(),
                    display_name: Some("Mara Winter".to_string()),
                    verified: true,
                },
            )
            .await
            .expect("seed sender identity")
    }

    pub async fn seed_unverified_identity(
        store: &InMemoryStore,
        user_id: Uuid,
    ) -> SenderIdentity {
        store
            .insert_sender_identity(
                user_id,
                SenderIdentityInput {
                    email: "pending@studio.example".to_string(),
                    display_name: None,
                    verified: false,
                },
            )
            .await
            .expect("seed sender identity")
    }
}
