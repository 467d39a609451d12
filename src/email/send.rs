//! The outbound email endpoint: guard -> rate limit -> validate -> send.
//!
//! `POST /api/email` delivers a prepared document PDF to a recipient. The
//! payload guard has already bounded the body size before this handler
//! runs; the handler applies the rate limit, validates the request,
//! makes exactly one provider call, and on provider success triggers the
//! document finalize flow (invoices lock, offers are marked sent).

use axum::{extract::State, http::HeaderMap, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppContext;
use crate::auth::AuthUser;
use crate::documents::DocumentKind;
use crate::error::{ApiError, Result};
use crate::http::AppJson;
use crate::invoices::{InvoiceLockService, InvoiceStatus};
use crate::offers::OfferStatus;
use crate::ratelimit::{client_key, ClientAddr};
use crate::traits::mailer::{Attachment, Email};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailSendRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub to: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub subject: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub message: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub pdf_base64: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub filename: String,
    pub sender_identity_id: Uuid,
    pub document_id: Option<Uuid>,
    pub document_type: Option<DocumentKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSendResponse {
    pub sent: bool,
    pub document_finalized: bool,
}

/// `POST /api/email`
pub async fn send_email_handler(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    ClientAddr(peer): ClientAddr,
    AppJson(req): AppJson<EmailSendRequest>,
) -> Result<Json<EmailSendResponse>> {
    let key = client_key("email", &headers, peer, ctx.config.rate_limit.trust_proxy);
    let decision = ctx.rate_limiter.check(&key).await;
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after_seconds: decision.retry_after_seconds,
        });
    }

    req.validate()?;
    let pdf_bytes = BASE64
        .decode(req.pdf_base64.as_bytes())
        .map_err(|_| ApiError::validation("pdfBase64 is not valid base64"))?;

    let identity = ctx
        .store
        .find_sender_identity(req.sender_identity_id, user_id)
        .await?
        .ok_or_else(|| ApiError::validation("unknown sender identity"))?;
    if !identity.verified {
        return Err(ApiError::forbidden("sender identity is not verified"));
    }

    // Gate the document before the provider call so an email is never sent
    // for a document that cannot be finalized afterwards.
    let document = match (req.document_type, req.document_id) {
        (Some(kind), Some(id)) => {
            match kind {
                DocumentKind::Invoice => {
                    let invoice = ctx
                        .store
                        .find_invoice(id, user_id)
                        .await?
                        .ok_or_else(|| ApiError::not_found("invoice not found"))?;
                    if invoice.is_locked {
                        return Err(ApiError::InvoiceLockedContent);
                    }
                    if !invoice.status.allows_locking() {
                        return Err(ApiError::InvoiceLockInvalidStatus(
                            invoice.status.to_string(),
                        ));
                    }
                }
                DocumentKind::Offer => {
                    ctx.store
                        .find_offer(id, user_id)
                        .await?
                        .ok_or_else(|| ApiError::not_found("offer not found"))?;
                }
            }
            Some((kind, id))
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::validation(
                "documentId and documentType must be provided together",
            ));
        }
    };

    let email = Email::new(identity.email.clone(), req.to.clone(), req.subject.clone())
        .text(req.message.clone())
        .attachment(Attachment {
            filename: req.filename.clone(),
            content_type: "application/pdf".to_string(),
            data: pdf_bytes,
        });

    // Exactly one provider call per accepted request. The finalize flow
    // below only runs once the provider reported success.
    ctx.mailer.send(&email).await?;

    let document_finalized = match document {
        Some((DocumentKind::Invoice, id)) => {
            InvoiceLockService::new(ctx.store.clone())
                .lock_after_send(id, user_id)
                .await?;
            ctx.store
                .set_invoice_status(id, user_id, InvoiceStatus::Sent)
                .await?;
            tracing::info!(invoice = %id, "invoice locked after send");
            true
        }
        Some((DocumentKind::Offer, id)) => {
            ctx.store
                .set_offer_status(id, user_id, OfferStatus::Sent)
                .await?;
            true
        }
        None => false,
    };

    Ok(Json(EmailSendResponse {
        sent: true,
        document_finalized,
    }))
}
