//! Email sending: provider backends, sender identities, and the
//! guard → rate-limit → send orchestration for outbound document emails.
//!
//! Backends:
//! - `ConsoleMailer` - prints emails to stdout (for development)
//! - `SmtpMailer` - sends emails via SMTP using lettre

mod console;
pub mod send;
mod smtp;

pub use console::ConsoleMailer;
pub use send::send_email_handler;
pub use smtp::{SmtpConfig, SmtpMailer};

// Re-export the message types from traits for convenience
pub use crate::traits::mailer::{Attachment, Email, Mailer};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A verified outbound address a user may send documents from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderIdentity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SenderIdentityInput {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub display_name: Option<String>,
    /// Verification is normally a separate confirmation flow; seeding and
    /// tests set this directly.
    #[serde(default)]
    pub verified: bool,
}
