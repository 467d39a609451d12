//! Persistence trait for the application.
//!
//! Handlers and services depend only on these capabilities (filtered
//! single-row reads, conditional updates), never on a concrete database
//! client, so the Postgres store and the in-memory test fake are
//! interchangeable. Every operation is scoped by `user_id`: the trait
//! mirrors the row-level security the schema enforces.

use async_trait::async_trait;
use uuid::Uuid;

use crate::clients::{Client, ClientInput};
use crate::documents::{DocumentKind, DocumentPayload};
use crate::email::{SenderIdentity, SenderIdentityInput};
use crate::error::Result;
use crate::invoices::{Invoice, InvoiceInput, InvoiceStatus, Payment, PaymentInput};
use crate::offers::{Offer, OfferInput, OfferStatus};
use crate::projects::{Project, ProjectInput};

#[async_trait]
pub trait AppStore: Send + Sync {
    // ---- clients ----
    async fn insert_client(&self, user_id: Uuid, input: ClientInput) -> Result<Client>;
    async fn list_clients(&self, user_id: Uuid) -> Result<Vec<Client>>;
    async fn find_client(&self, id: Uuid, user_id: Uuid) -> Result<Option<Client>>;
    async fn update_client(&self, id: Uuid, user_id: Uuid, input: ClientInput) -> Result<Client>;
    async fn delete_client(&self, id: Uuid, user_id: Uuid) -> Result<()>;

    // ---- projects ----
    async fn insert_project(&self, user_id: Uuid, input: ProjectInput) -> Result<Project>;
    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>>;
    async fn find_project(&self, id: Uuid, user_id: Uuid) -> Result<Option<Project>>;
    async fn update_project(&self, id: Uuid, user_id: Uuid, input: ProjectInput)
        -> Result<Project>;
    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<()>;

    // ---- offers ----
    async fn insert_offer(&self, user_id: Uuid, input: OfferInput) -> Result<Offer>;
    async fn list_offers(&self, user_id: Uuid) -> Result<Vec<Offer>>;
    async fn find_offer(&self, id: Uuid, user_id: Uuid) -> Result<Option<Offer>>;
    async fn update_offer(&self, id: Uuid, user_id: Uuid, input: OfferInput) -> Result<Offer>;
    async fn delete_offer(&self, id: Uuid, user_id: Uuid) -> Result<()>;
    async fn set_offer_status(&self, id: Uuid, user_id: Uuid, status: OfferStatus)
        -> Result<Offer>;

    // ---- invoices ----
    async fn insert_invoice(&self, user_id: Uuid, input: InvoiceInput) -> Result<Invoice>;
    async fn list_invoices(&self, user_id: Uuid) -> Result<Vec<Invoice>>;
    async fn find_invoice(&self, id: Uuid, user_id: Uuid) -> Result<Option<Invoice>>;
    /// Content update. Rejected by the storage guard when the invoice is
    /// locked (`INVOICE_LOCKED_CONTENT`) or when it would change an
    /// assigned number (`INVOICE_NUMBER_IMMUTABLE`).
    async fn update_invoice(&self, id: Uuid, user_id: Uuid, input: InvoiceInput)
        -> Result<Invoice>;
    async fn delete_invoice(&self, id: Uuid, user_id: Uuid) -> Result<()>;
    /// The single conditional lock update: `is_locked = true`,
    /// `finalized_at = coalesce(finalized_at, $now)`, filtered by
    /// `(id, user_id)`. Errors if the filter matches no row.
    async fn lock_invoice(&self, id: Uuid, user_id: Uuid, finalized_at: &str) -> Result<()>;
    /// Status-only update; permitted on locked invoices (payments must be
    /// able to move a locked invoice to `paid`).
    async fn set_invoice_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice>;

    // ---- payments ----
    async fn insert_payment(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: PaymentInput,
    ) -> Result<Payment>;
    async fn list_payments(&self, invoice_id: Uuid, user_id: Uuid) -> Result<Vec<Payment>>;

    // ---- sender identities ----
    async fn insert_sender_identity(
        &self,
        user_id: Uuid,
        input: SenderIdentityInput,
    ) -> Result<SenderIdentity>;
    async fn find_sender_identity(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SenderIdentity>>;
    /// The first verified identity, used when a request names none.
    async fn default_sender_identity(&self, user_id: Uuid) -> Result<Option<SenderIdentity>>;

    // ---- documents ----
    /// Assemble the complete rendering input for a document from its row
    /// and related records (single filtered read per record).
    async fn load_document_payload(
        &self,
        kind: DocumentKind,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DocumentPayload>>;

    /// Backend reachability for health checks.
    async fn ping(&self) -> bool {
        true
    }
}
