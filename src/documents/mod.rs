//! Shared document vocabulary for offers and invoices.
//!
//! A [`DocumentPayload`] is the complete, self-contained input to PDF
//! rendering: rendering is a pure function of this value, so the email
//! attachment path and the download path produce byte-identical output.

pub mod pdf;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppContext;
use crate::auth::AuthUser;
use crate::error::{ApiError, Result};

pub use pdf::{pdf_attachment, render_pdf, PdfAttachment};

/// The kinds of sendable documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Offer,
}

impl DocumentKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Offer => "offer",
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "invoice" => Ok(Self::Invoice),
            "offer" => Ok(Self::Offer),
            _ => Err(ApiError::validation(format!("unknown document kind: '{}'", s))),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One billable line of an offer or invoice.
///
/// Quantities are whole units and prices are cents so that totals and the
/// rendered PDF stay integer-only and reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl Position {
    #[must_use]
    pub fn line_total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// Sum of line totals for a set of positions.
#[must_use]
pub fn total_cents(positions: &[Position]) -> i64 {
    positions.iter().map(Position::line_total_cents).sum()
}

/// A party on a document: the issuing freelancer or the billed client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub name: String,
    pub email: Option<String>,
    pub address_lines: Vec<String>,
}

/// Everything PDF rendering needs, assembled by the store from the
/// document row and its related records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub kind: DocumentKind,
    /// Document number if assigned, otherwise a short id-derived reference.
    pub reference: String,
    pub issued_on: Option<String>,
    pub seller: Option<Party>,
    pub customer: Party,
    pub positions: Vec<Position>,
    pub total_cents: i64,
    pub currency: String,
}

/// `GET /api/documents/:kind/:id/pdf` — direct download path.
///
/// Shares `pdf_attachment` with the email path, so the bytes a client
/// downloads are identical to the bytes that were mailed out.
pub async fn download_pdf_handler(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Response> {
    let kind: DocumentKind = kind.parse()?;
    let payload = ctx
        .store
        .load_document_payload(kind, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))?;

    let attachment = pdf_attachment(&payload)?;
    let disposition = format!("attachment; filename=\"{}\"", attachment.filename);

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        attachment.buffer,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        assert_eq!("invoice".parse::<DocumentKind>().unwrap(), DocumentKind::Invoice);
        assert_eq!("offer".parse::<DocumentKind>().unwrap(), DocumentKind::Offer);
        assert!("receipt".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_position_totals() {
        let positions = vec![
            Position {
                description: "Design".to_string(),
                quantity: 3,
                unit_price_cents: 9500,
            },
            Position {
                description: "Hosting".to_string(),
                quantity: 1,
                unit_price_cents: 1200,
            },
        ];
        assert_eq!(positions[0].line_total_cents(), 28_500);
        assert_eq!(total_cents(&positions), 29_700);
    }
}
