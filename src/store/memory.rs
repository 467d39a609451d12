//! In-memory store for tests and local development.
//!
//! Mirrors the storage-layer guard semantics of the Postgres schema: a
//! locked invoice rejects every content mutation and deletion, an assigned
//! invoice number never changes, and the lock transition is monotonic with
//! `finalized_at` written exactly once. Tests that assert guard behavior
//! run against this fake without a live database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::clients::{Client, ClientInput};
use crate::documents::{self, DocumentKind, DocumentPayload, Party};
use crate::email::{SenderIdentity, SenderIdentityInput};
use crate::error::{ApiError, Result};
use crate::invoices::{Invoice, InvoiceInput, InvoiceStatus, Payment, PaymentInput};
use crate::offers::{Offer, OfferInput, OfferStatus};
use crate::projects::{Project, ProjectInput};
use crate::traits::store::AppStore;

#[derive(Default)]
struct Inner {
    clients: HashMap<Uuid, Client>,
    projects: HashMap<Uuid, Project>,
    offers: HashMap<Uuid, Offer>,
    invoices: HashMap<Uuid, Invoice>,
    payments: Vec<Payment>,
    identities: Vec<SenderIdentity>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
    lock_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            lock_calls: AtomicUsize::new(0),
        }
    }

    /// Number of lock updates issued so far (for assertions on the lock
    /// service's one-update contract).
    pub fn lock_calls(&self) -> usize {
        self.lock_calls.load(Ordering::Relaxed)
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_age<T: Clone>(items: Vec<T>, key: impl Fn(&T) -> (chrono::DateTime<Utc>, Uuid)) -> Vec<T> {
    let mut items = items;
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl AppStore for InMemoryStore {
    // ---- clients ----

    async fn insert_client(&self, user_id: Uuid, input: ClientInput) -> Result<Client> {
        let client = Client {
            id: Uuid::new_v4(),
            user_id,
            name: input.name,
            email: input.email,
            address_lines: input.address_lines,
            created_at: Utc::now(),
        };
        self.lock_inner().clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn list_clients(&self, user_id: Uuid) -> Result<Vec<Client>> {
        let clients: Vec<Client> = self
            .lock_inner()
            .clients
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by_age(clients, |c| (c.created_at, c.id)))
    }

    async fn find_client(&self, id: Uuid, user_id: Uuid) -> Result<Option<Client>> {
        Ok(self
            .lock_inner()
            .clients
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }

    async fn update_client(&self, id: Uuid, user_id: Uuid, input: ClientInput) -> Result<Client> {
        let mut inner = self.lock_inner();
        let client = inner
            .clients
            .get_mut(&id)
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("client not found"))?;
        client.name = input.name;
        client.email = input.email;
        client.address_lines = input.address_lines;
        Ok(client.clone())
    }

    async fn delete_client(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut inner = self.lock_inner();
        match inner.clients.get(&id) {
            Some(c) if c.user_id == user_id => {
                inner.clients.remove(&id);
                Ok(())
            }
            _ => Err(ApiError::not_found("client not found")),
        }
    }

    // ---- projects ----

    async fn insert_project(&self, user_id: Uuid, input: ProjectInput) -> Result<Project> {
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            client_id: input.client_id,
            name: input.name,
            archived: input.archived,
            created_at: Utc::now(),
        };
        self.lock_inner().projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>> {
        let projects: Vec<Project> = self
            .lock_inner()
            .projects
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by_age(projects, |p| (p.created_at, p.id)))
    }

    async fn find_project(&self, id: Uuid, user_id: Uuid) -> Result<Option<Project>> {
        Ok(self
            .lock_inner()
            .projects
            .get(&id)
            .filter(|p| p.user_id == user_id)
            .cloned())
    }

    async fn update_project(
        &self,
        id: Uuid,
        user_id: Uuid,
        input: ProjectInput,
    ) -> Result<Project> {
        let mut inner = self.lock_inner();
        let project = inner
            .projects
            .get_mut(&id)
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("project not found"))?;
        project.client_id = input.client_id;
        project.name = input.name;
        project.archived = input.archived;
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut inner = self.lock_inner();
        match inner.projects.get(&id) {
            Some(p) if p.user_id == user_id => {
                inner.projects.remove(&id);
                Ok(())
            }
            _ => Err(ApiError::not_found("project not found")),
        }
    }

    // ---- offers ----

    async fn insert_offer(&self, user_id: Uuid, input: OfferInput) -> Result<Offer> {
        let total_cents = documents::total_cents(&input.positions);
        let offer = Offer {
            id: Uuid::new_v4(),
            user_id,
            client_id: input.client_id,
            project_id: input.project_id,
            number: input.number,
            status: OfferStatus::Draft,
            positions: input.positions,
            total_cents,
            currency: input.currency,
            valid_until: input.valid_until,
            created_at: Utc::now(),
        };
        self.lock_inner().offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    async fn list_offers(&self, user_id: Uuid) -> Result<Vec<Offer>> {
        let offers: Vec<Offer> = self
            .lock_inner()
            .offers
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by_age(offers, |o| (o.created_at, o.id)))
    }

    async fn find_offer(&self, id: Uuid, user_id: Uuid) -> Result<Option<Offer>> {
        Ok(self
            .lock_inner()
            .offers
            .get(&id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn update_offer(&self, id: Uuid, user_id: Uuid, input: OfferInput) -> Result<Offer> {
        let mut inner = self.lock_inner();
        let offer = inner
            .offers
            .get_mut(&id)
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("offer not found"))?;
        offer.client_id = input.client_id;
        offer.project_id = input.project_id;
        offer.number = input.number;
        offer.total_cents = documents::total_cents(&input.positions);
        offer.positions = input.positions;
        offer.currency = input.currency;
        offer.valid_until = input.valid_until;
        Ok(offer.clone())
    }

    async fn delete_offer(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut inner = self.lock_inner();
        match inner.offers.get(&id) {
            Some(o) if o.user_id == user_id => {
                inner.offers.remove(&id);
                Ok(())
            }
            _ => Err(ApiError::not_found("offer not found")),
        }
    }

    async fn set_offer_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: OfferStatus,
    ) -> Result<Offer> {
        let mut inner = self.lock_inner();
        let offer = inner
            .offers
            .get_mut(&id)
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("offer not found"))?;
        offer.status = status;
        Ok(offer.clone())
    }

    // ---- invoices ----

    async fn insert_invoice(&self, user_id: Uuid, input: InvoiceInput) -> Result<Invoice> {
        let total_cents = documents::total_cents(&input.positions);
        let invoice = Invoice {
            id: Uuid::new_v4(),
            user_id,
            client_id: input.client_id,
            project_id: input.project_id,
            number: input.number,
            status: InvoiceStatus::Draft,
            issue_date: input.issue_date,
            due_date: input.due_date,
            positions: input.positions,
            total_cents,
            currency: input.currency,
            is_locked: false,
            finalized_at: None,
            created_at: Utc::now(),
        };
        self.lock_inner().invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn list_invoices(&self, user_id: Uuid) -> Result<Vec<Invoice>> {
        let invoices: Vec<Invoice> = self
            .lock_inner()
            .invoices
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by_age(invoices, |i| (i.created_at, i.id)))
    }

    async fn find_invoice(&self, id: Uuid, user_id: Uuid) -> Result<Option<Invoice>> {
        Ok(self
            .lock_inner()
            .invoices
            .get(&id)
            .filter(|i| i.user_id == user_id)
            .cloned())
    }

    async fn update_invoice(
        &self,
        id: Uuid,
        user_id: Uuid,
        input: InvoiceInput,
    ) -> Result<Invoice> {
        let mut inner = self.lock_inner();
        let invoice = inner
            .invoices
            .get_mut(&id)
            .filter(|i| i.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("invoice not found"))?;

        // Same rejections the DB trigger raises.
        if invoice.number.is_some() && input.number != invoice.number {
            return Err(ApiError::InvoiceNumberImmutable);
        }
        if invoice.is_locked {
            let content_changed = invoice.client_id != input.client_id
                || invoice.project_id != input.project_id
                || invoice.number != input.number
                || invoice.issue_date != input.issue_date
                || invoice.due_date != input.due_date
                || invoice.positions != input.positions
                || invoice.currency != input.currency;
            if content_changed {
                return Err(ApiError::InvoiceLockedContent);
            }
            return Ok(invoice.clone());
        }

        invoice.client_id = input.client_id;
        invoice.project_id = input.project_id;
        invoice.number = input.number;
        invoice.issue_date = input.issue_date;
        invoice.due_date = input.due_date;
        invoice.total_cents = documents::total_cents(&input.positions);
        invoice.positions = input.positions;
        invoice.currency = input.currency;
        Ok(invoice.clone())
    }

    async fn delete_invoice(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let mut inner = self.lock_inner();
        match inner.invoices.get(&id) {
            Some(i) if i.user_id == user_id => {
                if i.is_locked {
                    return Err(ApiError::InvoiceLockedContent);
                }
                inner.invoices.remove(&id);
                Ok(())
            }
            _ => Err(ApiError::not_found("invoice not found")),
        }
    }

    async fn lock_invoice(&self, id: Uuid, user_id: Uuid, finalized_at: &str) -> Result<()> {
        self.lock_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.lock_inner();
        let invoice = inner
            .invoices
            .get_mut(&id)
            .filter(|i| i.user_id == user_id)
            .ok_or_else(|| ApiError::storage("invoice not found"))?;

        invoice.is_locked = true;
        if invoice.finalized_at.is_none() {
            invoice.finalized_at = Some(finalized_at.to_string());
        }
        Ok(())
    }

    async fn set_invoice_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice> {
        let mut inner = self.lock_inner();
        let invoice = inner
            .invoices
            .get_mut(&id)
            .filter(|i| i.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("invoice not found"))?;
        invoice.status = status;
        Ok(invoice.clone())
    }

    // ---- payments ----

    async fn insert_payment(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: PaymentInput,
    ) -> Result<Payment> {
        let mut inner = self.lock_inner();
        inner
            .invoices
            .get(&invoice_id)
            .filter(|i| i.user_id == user_id)
            .ok_or_else(|| ApiError::not_found("invoice not found"))?;

        let payment = Payment {
            id: Uuid::new_v4(),
            invoice_id,
            user_id,
            amount_cents: input.amount_cents,
            paid_on: input.paid_on,
            note: input.note,
            created_at: Utc::now(),
        };
        inner.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_payments(&self, invoice_id: Uuid, user_id: Uuid) -> Result<Vec<Payment>> {
        Ok(self
            .lock_inner()
            .payments
            .iter()
            .filter(|p| p.invoice_id == invoice_id && p.user_id == user_id)
            .cloned()
            .collect())
    }

    // ---- sender identities ----

    async fn insert_sender_identity(
        &self,
        user_id: Uuid,
        input: SenderIdentityInput,
    ) -> Result<SenderIdentity> {
        let identity = SenderIdentity {
            id: Uuid::new_v4(),
            user_id,
            email: input.email,
            display_name: input.display_name,
            verified: input.verified,
            created_at: Utc::now(),
        };
        self.lock_inner().identities.push(identity.clone());
        Ok(identity)
    }

    async fn find_sender_identity(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SenderIdentity>> {
        Ok(self
            .lock_inner()
            .identities
            .iter()
            .find(|i| i.id == id && i.user_id == user_id)
            .cloned())
    }

    async fn default_sender_identity(&self, user_id: Uuid) -> Result<Option<SenderIdentity>> {
        Ok(self
            .lock_inner()
            .identities
            .iter()
            .find(|i| i.user_id == user_id && i.verified)
            .cloned())
    }

    // ---- documents ----

    async fn load_document_payload(
        &self,
        kind: DocumentKind,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DocumentPayload>> {
        let inner = self.lock_inner();

        let seller = inner
            .identities
            .iter()
            .find(|i| i.user_id == user_id && i.verified)
            .map(|identity| Party {
                name: identity
                    .display_name
                    .clone()
                    .unwrap_or_else(|| identity.email.clone()),
                email: Some(identity.email.clone()),
                address_lines: vec![],
            });

        let customer_of = |client_id: Uuid| -> Result<Party> {
            let client = inner
                .clients
                .get(&client_id)
                .filter(|c| c.user_id == user_id)
                .ok_or_else(|| ApiError::storage("client record missing for document"))?;
            Ok(Party {
                name: client.name.clone(),
                email: client.email.clone(),
                address_lines: client.address_lines.clone(),
            })
        };

        match kind {
            DocumentKind::Invoice => {
                let Some(invoice) = inner.invoices.get(&id).filter(|i| i.user_id == user_id)
                else {
                    return Ok(None);
                };
                Ok(Some(DocumentPayload {
                    kind,
                    reference: invoice.reference(),
                    issued_on: invoice.issue_date.map(|d| d.to_string()),
                    seller,
                    customer: customer_of(invoice.client_id)?,
                    positions: invoice.positions.clone(),
                    total_cents: invoice.total_cents,
                    currency: invoice.currency.clone(),
                }))
            }
            DocumentKind::Offer => {
                let Some(offer) = inner.offers.get(&id).filter(|o| o.user_id == user_id) else {
                    return Ok(None);
                };
                let reference = match &offer.number {
                    Some(number) => number.clone(),
                    None => {
                        let id = offer.id.simple().to_string();
                        format!("draft-{}", &id[..8])
                    }
                };
                Ok(Some(DocumentPayload {
                    kind,
                    reference,
                    issued_on: None,
                    seller,
                    customer: customer_of(offer.client_id)?,
                    positions: offer.positions.clone(),
                    total_cents: offer.total_cents,
                    currency: offer.currency.clone(),
                }))
            }
        }
    }
}
