//! Postgres store backed by sqlx.
//!
//! Every statement filters by `user_id` alongside the primary key, so a
//! request can never touch another tenant's rows even before the
//! database's row-level security policies apply. The invoice guard
//! trigger (`prevent_locked_invoice_update`, installed by the migrations)
//! raises with `INVOICE_LOCKED_CONTENT` / `INVOICE_NUMBER_IMMUTABLE`
//! markers, which the error layer maps back onto API codes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use crate::clients::{Client, ClientInput};
use crate::documents::{self, DocumentKind, DocumentPayload, Party, Position};
use crate::email::{SenderIdentity, SenderIdentityInput};
use crate::error::{ApiError, Result};
use crate::invoices::{Invoice, InvoiceInput, InvoiceStatus, Payment, PaymentInput};
use crate::offers::{Offer, OfferInput, OfferStatus};
use crate::projects::{Project, ProjectInput};
use crate::traits::store::AppStore;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| ApiError::storage(format!("failed to connect to database: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations (schema, guard trigger, RLS policies).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::storage(format!("migration failed: {}", e)))
    }
}

#[derive(sqlx::FromRow)]
struct ClientRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    email: Option<String>,
    address_lines: Json<Vec<String>>,
    created_at: DateTime<Utc>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            address_lines: row.address_lines.0,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: Uuid,
    user_id: Uuid,
    client_id: Uuid,
    project_id: Option<Uuid>,
    number: Option<String>,
    status: String,
    positions: Json<Vec<Position>>,
    total_cents: i64,
    currency: String,
    valid_until: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = ApiError;

    fn try_from(row: OfferRow) -> Result<Self> {
        Ok(Offer {
            id: row.id,
            user_id: row.user_id,
            client_id: row.client_id,
            project_id: row.project_id,
            number: row.number,
            status: row.status.parse::<OfferStatus>()?,
            positions: row.positions.0,
            total_cents: row.total_cents,
            currency: row.currency,
            valid_until: row.valid_until,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    user_id: Uuid,
    client_id: Uuid,
    project_id: Option<Uuid>,
    number: Option<String>,
    status: String,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    positions: Json<Vec<Position>>,
    total_cents: i64,
    currency: String,
    is_locked: bool,
    finalized_at: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = ApiError;

    fn try_from(row: InvoiceRow) -> Result<Self> {
        Ok(Invoice {
            id: row.id,
            user_id: row.user_id,
            client_id: row.client_id,
            project_id: row.project_id,
            number: row.number,
            status: row.status.parse::<InvoiceStatus>()?,
            issue_date: row.issue_date,
            due_date: row.due_date,
            positions: row.positions.0,
            total_cents: row.total_cents,
            currency: row.currency,
            is_locked: row.is_locked,
            finalized_at: row.finalized_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    invoice_id: Uuid,
    user_id: Uuid,
    amount_cents: i64,
    paid_on: Option<NaiveDate>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            invoice_id: row.invoice_id,
            user_id: row.user_id,
            amount_cents: row.amount_cents,
            paid_on: row.paid_on,
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SenderIdentityRow {
    id: Uuid,
    user_id: Uuid,
    email: String,
    display_name: Option<String>,
    verified: bool,
    created_at: DateTime<Utc>,
}

impl From<SenderIdentityRow> for SenderIdentity {
    fn from(row: SenderIdentityRow) -> Self {
        SenderIdentity {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            display_name: row.display_name,
            verified: row.verified,
            created_at: row.created_at,
        }
    }
}

const CLIENT_COLUMNS: &str = "id, user_id, name, email, address_lines, created_at";
const OFFER_COLUMNS: &str =
    "id, user_id, client_id, project_id, number, status, positions, total_cents, currency, valid_until, created_at";
const INVOICE_COLUMNS: &str =
    "id, user_id, client_id, project_id, number, status, issue_date, due_date, positions, total_cents, currency, is_locked, finalized_at, created_at";
const PAYMENT_COLUMNS: &str =
    "id, invoice_id, user_id, amount_cents, paid_on, note, created_at";
const IDENTITY_COLUMNS: &str = "id, user_id, email, display_name, verified, created_at";

#[async_trait]
impl AppStore for PgStore {
    // ---- clients ----

    async fn insert_client(&self, user_id: Uuid, input: ClientInput) -> Result<Client> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "INSERT INTO clients (id, user_id, name, email, address_lines) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(Json(&input.address_lines))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_clients(&self, user_id: Uuid) -> Result<Vec<Client>> {
        let rows = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_client(&self, id: Uuid, user_id: Uuid) -> Result<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn update_client(&self, id: Uuid, user_id: Uuid, input: ClientInput) -> Result<Client> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "UPDATE clients SET name = $3, email = $4, address_lines = $5 \
             WHERE id = $1 AND user_id = $2 RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(Json(&input.address_lines))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("client not found"))?;
        Ok(row.into())
    }

    async fn delete_client(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("client not found"));
        }
        Ok(())
    }

    // ---- projects ----

    async fn insert_project(&self, user_id: Uuid, input: ProjectInput) -> Result<Project> {
        let row = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (id, user_id, client_id, name, archived) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, client_id, name, archived, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(input.archived)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>> {
        Ok(sqlx::query_as::<_, Project>(
            "SELECT id, user_id, client_id, name, archived, created_at \
             FROM projects WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_project(&self, id: Uuid, user_id: Uuid) -> Result<Option<Project>> {
        Ok(sqlx::query_as::<_, Project>(
            "SELECT id, user_id, client_id, name, archived, created_at \
             FROM projects WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_project(
        &self,
        id: Uuid,
        user_id: Uuid,
        input: ProjectInput,
    ) -> Result<Project> {
        sqlx::query_as::<_, Project>(
            "UPDATE projects SET client_id = $3, name = $4, archived = $5 \
             WHERE id = $1 AND user_id = $2 \
             RETURNING id, user_id, client_id, name, archived, created_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(input.client_id)
        .bind(&input.name)
        .bind(input.archived)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("project not found"))
    }

    async fn delete_project(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("project not found"));
        }
        Ok(())
    }

    // ---- offers ----

    async fn insert_offer(&self, user_id: Uuid, input: OfferInput) -> Result<Offer> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "INSERT INTO offers (id, user_id, client_id, project_id, number, status, positions, total_cents, currency, valid_until) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {OFFER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&input.number)
        .bind(OfferStatus::Draft.as_str())
        .bind(Json(&input.positions))
        .bind(documents::total_cents(&input.positions))
        .bind(&input.currency)
        .bind(input.valid_until)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn list_offers(&self, user_id: Uuid) -> Result<Vec<Offer>> {
        let rows = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_offer(&self, id: Uuid, user_id: Uuid) -> Result<Option<Offer>> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_offer(&self, id: Uuid, user_id: Uuid, input: OfferInput) -> Result<Offer> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "UPDATE offers SET client_id = $3, project_id = $4, number = $5, positions = $6, \
             total_cents = $7, currency = $8, valid_until = $9 \
             WHERE id = $1 AND user_id = $2 RETURNING {OFFER_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&input.number)
        .bind(Json(&input.positions))
        .bind(documents::total_cents(&input.positions))
        .bind(&input.currency)
        .bind(input.valid_until)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("offer not found"))?;
        row.try_into()
    }

    async fn delete_offer(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("offer not found"));
        }
        Ok(())
    }

    async fn set_offer_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: OfferStatus,
    ) -> Result<Offer> {
        let row = sqlx::query_as::<_, OfferRow>(&format!(
            "UPDATE offers SET status = $3 WHERE id = $1 AND user_id = $2 RETURNING {OFFER_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("offer not found"))?;
        row.try_into()
    }

    // ---- invoices ----

    async fn insert_invoice(&self, user_id: Uuid, input: InvoiceInput) -> Result<Invoice> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "INSERT INTO invoices (id, user_id, client_id, project_id, number, status, issue_date, due_date, positions, total_cents, currency) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&input.number)
        .bind(InvoiceStatus::Draft.as_str())
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(Json(&input.positions))
        .bind(documents::total_cents(&input.positions))
        .bind(&input.currency)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn list_invoices(&self, user_id: Uuid) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE user_id = $1 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_invoice(&self, id: Uuid, user_id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_invoice(
        &self,
        id: Uuid,
        user_id: Uuid,
        input: InvoiceInput,
    ) -> Result<Invoice> {
        // The guard trigger rejects this statement outright for locked
        // invoices and for number changes; no application-side pre-check.
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "UPDATE invoices SET client_id = $3, project_id = $4, number = $5, issue_date = $6, \
             due_date = $7, positions = $8, total_cents = $9, currency = $10, updated_at = now() \
             WHERE id = $1 AND user_id = $2 RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(&input.number)
        .bind(input.issue_date)
        .bind(input.due_date)
        .bind(Json(&input.positions))
        .bind(documents::total_cents(&input.positions))
        .bind(&input.currency)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
        row.try_into()
    }

    async fn delete_invoice(&self, id: Uuid, user_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("invoice not found"));
        }
        Ok(())
    }

    async fn lock_invoice(&self, id: Uuid, user_id: Uuid, finalized_at: &str) -> Result<()> {
        // Single conditional update; COALESCE keeps the first timestamp so
        // repeat locking stays idempotent under the guard trigger.
        let result = sqlx::query(
            "UPDATE invoices SET is_locked = TRUE, finalized_at = COALESCE(finalized_at, $3), \
             updated_at = now() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(finalized_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::storage("invoice not found"));
        }
        Ok(())
    }

    async fn set_invoice_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Invoice> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "UPDATE invoices SET status = $3, updated_at = now() \
             WHERE id = $1 AND user_id = $2 RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
        row.try_into()
    }

    // ---- payments ----

    async fn insert_payment(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: PaymentInput,
    ) -> Result<Payment> {
        self.find_invoice(invoice_id, user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("invoice not found"))?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "INSERT INTO invoice_payments (id, invoice_id, user_id, amount_cents, paid_on, note) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(user_id)
        .bind(input.amount_cents)
        .bind(input.paid_on)
        .bind(&input.note)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn list_payments(&self, invoice_id: Uuid, user_id: Uuid) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM invoice_payments \
             WHERE invoice_id = $1 AND user_id = $2 ORDER BY created_at, id"
        ))
        .bind(invoice_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ---- sender identities ----

    async fn insert_sender_identity(
        &self,
        user_id: Uuid,
        input: SenderIdentityInput,
    ) -> Result<SenderIdentity> {
        let row = sqlx::query_as::<_, SenderIdentityRow>(&format!(
            "INSERT INTO sender_identities (id, user_id, email, display_name, verified) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.email)
        .bind(&input.display_name)
        .bind(input.verified)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_sender_identity(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SenderIdentity>> {
        let row = sqlx::query_as::<_, SenderIdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM sender_identities WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn default_sender_identity(&self, user_id: Uuid) -> Result<Option<SenderIdentity>> {
        let row = sqlx::query_as::<_, SenderIdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM sender_identities \
             WHERE user_id = $1 AND verified ORDER BY created_at, id LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    // ---- documents ----

    async fn load_document_payload(
        &self,
        kind: DocumentKind,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DocumentPayload>> {
        let seller = self.default_sender_identity(user_id).await?.map(|identity| Party {
            name: identity.display_name.unwrap_or_else(|| identity.email.clone()),
            email: Some(identity.email),
            address_lines: vec![],
        });

        match kind {
            DocumentKind::Invoice => {
                let Some(invoice) = self.find_invoice(id, user_id).await? else {
                    return Ok(None);
                };
                let client = self
                    .find_client(invoice.client_id, user_id)
                    .await?
                    .ok_or_else(|| ApiError::storage("client record missing for document"))?;
                Ok(Some(DocumentPayload {
                    kind,
                    reference: invoice.reference(),
                    issued_on: invoice.issue_date.map(|d| d.to_string()),
                    seller,
                    customer: Party {
                        name: client.name,
                        email: client.email,
                        address_lines: client.address_lines,
                    },
                    positions: invoice.positions,
                    total_cents: invoice.total_cents,
                    currency: invoice.currency,
                }))
            }
            DocumentKind::Offer => {
                let Some(offer) = self.find_offer(id, user_id).await? else {
                    return Ok(None);
                };
                let client = self
                    .find_client(offer.client_id, user_id)
                    .await?
                    .ok_or_else(|| ApiError::storage("client record missing for document"))?;
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
                    customer: Party {
                        name: client.name,
                        email: client.email,
                        address_lines: client.address_lines,
                    },
                    positions: offer.positions,
                    total_cents: offer.total_cents,
                    currency: offer.currency,
                }))
            }
        }
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
