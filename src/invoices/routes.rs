//! HTTP surface for invoice management, payments, and finalization.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppContext;
use crate::auth::AuthUser;
use crate::documents::{pdf_attachment, DocumentKind};
use crate::error::{ApiError, Result};
use crate::http::AppJson;
use crate::invoices::{Invoice, InvoiceInput, InvoiceLockService, InvoiceStatus, Payment, PaymentInput};
use crate::ratelimit::{client_key, ClientAddr};
use crate::traits::mailer::{Attachment, Email};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route(
            "/{id}",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/{id}/status", patch(set_invoice_status))
        .route("/{id}/finalize", post(finalize_invoice))
        .route("/{id}/payments", get(list_payments).post(record_payment))
}

async fn list_invoices(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Invoice>>> {
    Ok(Json(ctx.store.list_invoices(user_id).await?))
}

async fn create_invoice(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    AppJson(input): AppJson<InvoiceInput>,
) -> Result<Json<Invoice>> {
    input.validate()?;
    Ok(Json(ctx.store.insert_invoice(user_id, input).await?))
}

async fn get_invoice(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>> {
    let invoice = ctx
        .store
        .find_invoice(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
    Ok(Json(invoice))
}

/// Content updates. The storage guard rejects these outright for locked
/// invoices and keeps the invoice number immutable once assigned.
async fn update_invoice(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<InvoiceInput>,
) -> Result<Json<Invoice>> {
    input.validate()?;
    Ok(Json(ctx.store.update_invoice(id, user_id, input).await?))
}

async fn delete_invoice(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    ctx.store.delete_invoice(id, user_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct InvoiceStatusInput {
    status: InvoiceStatus,
}

async fn set_invoice_status(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<InvoiceStatusInput>,
) -> Result<Json<Invoice>> {
    let invoice = ctx
        .store
        .find_invoice(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;

    if !invoice.status.can_transition_to(input.status) {
        return Err(ApiError::StatusTransitionNotAllowed {
            from: invoice.status.to_string(),
            to: input.status.to_string(),
        });
    }

    Ok(Json(
        ctx.store.set_invoice_status(id, user_id, input.status).await?,
    ))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
struct FinalizeRequest {
    /// Recipient override; defaults to the client's email address.
    #[validate(email(message = "must be a valid email address"))]
    to: Option<String>,
    /// Sender identity override; defaults to the first verified identity.
    sender_identity_id: Option<Uuid>,
}

/// `POST /api/invoices/:id/finalize` — render, email, then lock.
///
/// The status gate runs before the provider call; the lock transition runs
/// only after the provider reported success, so an invoice is never marked
/// locked when its email did not go out.
async fn finalize_invoice(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    ClientAddr(peer): ClientAddr,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<FinalizeRequest>,
) -> Result<Json<Invoice>> {
    let key = client_key(
        "invoice-finalize",
        &headers,
        peer,
        ctx.config.rate_limit.trust_proxy,
    );
    let decision = ctx.rate_limiter.check(&key).await;
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after_seconds: decision.retry_after_seconds,
        });
    }

    req.validate()?;

    let invoice = ctx
        .store
        .find_invoice(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
    if invoice.is_locked {
        return Err(ApiError::InvoiceLockedContent);
    }
    if !invoice.status.allows_locking() {
        return Err(ApiError::InvoiceLockInvalidStatus(invoice.status.to_string()));
    }

    let identity = match req.sender_identity_id {
        Some(identity_id) => ctx
            .store
            .find_sender_identity(identity_id, user_id)
            .await?
            .ok_or_else(|| ApiError::validation("unknown sender identity"))?,
        None => ctx
            .store
            .default_sender_identity(user_id)
            .await?
            .ok_or_else(|| ApiError::validation("no verified sender identity configured"))?,
    };
    if !identity.verified {
        return Err(ApiError::forbidden("sender identity is not verified"));
    }

    let payload = ctx
        .store
        .load_document_payload(DocumentKind::Invoice, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;

    let recipient = match req.to {
        Some(to) => to,
        None => payload
            .customer
            .email
            .clone()
            .ok_or_else(|| ApiError::validation("client has no email address"))?,
    };

    let attachment = pdf_attachment(&payload)?;
    let email = Email::new(
        identity.email.clone(),
        recipient,
        format!("Invoice {}", payload.reference),
    )
    .text(format!(
        "Please find invoice {} attached as a PDF.",
        payload.reference
    ))
    .attachment(Attachment {
        filename: attachment.filename,
        content_type: "application/pdf".to_string(),
        data: attachment.buffer,
    });

    ctx.mailer.send(&email).await?;

    InvoiceLockService::new(ctx.store.clone())
        .lock_after_send(id, user_id)
        .await?;
    let invoice = ctx
        .store
        .set_invoice_status(id, user_id, InvoiceStatus::Sent)
        .await?;

    tracing::info!(invoice = %id, "invoice finalized and locked");
    Ok(Json(invoice))
}

async fn list_payments(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>> {
    ctx.store
        .find_invoice(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
    Ok(Json(ctx.store.list_payments(id, user_id).await?))
}

/// Payments stay appendable after locking; covering the total moves the
/// invoice to `paid` (a permitted transition on locked invoices).
async fn record_payment(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<PaymentInput>,
) -> Result<Json<Payment>> {
    input.validate()?;

    let invoice = ctx
        .store
        .find_invoice(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("invoice not found"))?;

    let payment = ctx.store.insert_payment(user_id, id, input).await?;

    let paid: i64 = ctx
        .store
        .list_payments(id, user_id)
        .await?
        .iter()
        .map(|p| p.amount_cents)
        .sum();
    if paid >= invoice.total_cents && invoice.status.can_transition_to(InvoiceStatus::Paid) {
        ctx.store
            .set_invoice_status(id, user_id, InvoiceStatus::Paid)
            .await?;
    }

    Ok(Json(payment))
}
