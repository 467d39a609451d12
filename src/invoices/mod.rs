//! Invoice domain: types, the status state machine, the lock service, and
//! the HTTP surface for invoice management and finalization.
//!
//! The central invariant lives here and in the storage layer: once an
//! invoice has been sent, its content is permanently immutable. The
//! application issues the lock transition; the database trigger
//! (`prevent_locked_invoice_update`, see migrations) is what makes the
//! invariant unforgeable against any code path.

pub mod lock;
mod routes;

pub use lock::InvoiceLockService;
pub use routes::routes;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::documents::Position;
use crate::error::ApiError;

/// Invoice lifecycle status.
///
/// `draft` and `open` invoices may still be edited and finalized; `sent`
/// marks a delivered (and therefore locked) invoice; payments move it to
/// `paid`. `cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Sent,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the finalize flow may lock an invoice in this status.
    #[must_use]
    pub fn allows_locking(&self) -> bool {
        matches!(self, Self::Draft | Self::Open)
    }

    /// Manual status transitions (outside the finalize flow, which sets
    /// `sent` itself after a successful delivery).
    #[must_use]
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Open) | (Draft, Cancelled) | (Open, Paid) | (Open, Cancelled) | (Sent, Paid) | (Sent, Cancelled)
        )
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "open" => Ok(Self::Open),
            "sent" => Ok(Self::Sent),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ApiError::validation(format!("invalid invoice status: '{}'", s))),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    /// Immutable once assigned.
    pub number: Option<String>,
    pub status: InvoiceStatus,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub positions: Vec<Position>,
    pub total_cents: i64,
    pub currency: String,
    /// Set by the lock service; never reverts to false.
    pub is_locked: bool,
    /// ISO-8601 timestamp string, written exactly once at lock time.
    pub finalized_at: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Short reference for documents and filenames: the assigned number,
    /// or an id-derived placeholder for drafts.
    #[must_use]
    pub fn reference(&self) -> String {
        match &self.number {
            Some(number) => number.clone(),
            None => {
                let id = self.id.simple().to_string();
                format!("draft-{}", &id[..8])
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[validate(length(min = 3, max = 3, message = "must be a 3-letter currency code"))]
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub paid_on: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    #[validate(range(min = 1, message = "must be positive"))]
    pub amount_cents: i64,
    pub paid_on: Option<NaiveDate>,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Open,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
        assert!("void".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_lockable_statuses() {
        assert!(InvoiceStatus::Draft.allows_locking());
        assert!(InvoiceStatus::Open.allows_locking());
        assert!(!InvoiceStatus::Sent.allows_locking());
        assert!(!InvoiceStatus::Paid.allows_locking());
        assert!(!InvoiceStatus::Cancelled.allows_locking());
    }

    #[test]
    fn test_transition_table() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition_to(Open));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Open.can_transition_to(Paid));
        assert!(Sent.can_transition_to(Paid));
        // `sent` is only reachable through finalize
        assert!(!Draft.can_transition_to(Sent));
        assert!(!Open.can_transition_to(Sent));
        // terminal states
        assert!(!Paid.can_transition_to(Open));
        assert!(!Cancelled.can_transition_to(Draft));
        // no un-cancelling, no reopening
        assert!(!Paid.can_transition_to(Cancelled));
    }

    #[test]
    fn test_reference_prefers_number() {
        let id = Uuid::new_v4();
        let invoice = Invoice {
            id,
            user_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            project_id: None,
            number: Some("2026-0042".to_string()),
            status: InvoiceStatus::Draft,
            issue_date: None,
            due_date: None,
            positions: vec![],
            total_cents: 0,
            currency: "EUR".to_string(),
            is_locked: false,
            finalized_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(invoice.reference(), "2026-0042");

        let unnumbered = Invoice {
            number: None,
            ..invoice
        };
        assert!(unnumbered.reference().starts_with("draft-"));
    }
}
