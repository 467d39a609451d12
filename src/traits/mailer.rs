//! Mailer trait for sending emails.
//!
//! This trait abstracts the email provider so the app can swap between
//! SMTP, console output for development, or a recording fake in tests.

use crate::error::Result;
use async_trait::async_trait;

/// A binary attachment carried by an email (invoice/offer PDFs).
#[derive(Debug, Clone)]
pub struct Attachment {
    /// File name shown to the recipient (e.g. "invoice-2026-001.pdf")
    pub filename: String,
    /// MIME type, e.g. "application/pdf"
    pub content_type: String,
    /// Raw file bytes
    pub data: Vec<u8>,
}

/// An email message to be sent
#[derive(Debug, Clone)]
pub struct Email {
    /// Sender email address (a verified sender identity)
    pub from: String,
    /// Recipient email addresses
    pub to: Vec<String>,
    /// Email subject line
    pub subject: String,
    /// Plain text body (optional if html is provided)
    pub text: Option<String>,
    /// HTML body (optional if text is provided)
    pub html: Option<String>,
    /// Reply-to address (optional)
    pub reply_to: Option<String>,
    /// Binary attachments
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Create a new email with the required fields
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            subject: subject.into(),
            text: None,
            html: None,
            reply_to: None,
            attachments: Vec::new(),
        }
    }

    /// Add a recipient
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Set the plain text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    /// Set the HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }

    /// Set the reply-to address
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Attach a file
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Validate the email has required fields
    pub fn validate(&self) -> Result<()> {
        if self.from.is_empty() {
            return Err(crate::error::ApiError::validation("email 'from' is required"));
        }
        if self.to.is_empty() {
            return Err(crate::error::ApiError::validation("email 'to' is required"));
        }
        if self.subject.is_empty() {
            return Err(crate::error::ApiError::validation("email 'subject' is required"));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(crate::error::ApiError::validation(
                "email must have either 'text' or 'html' body",
            ));
        }
        Ok(())
    }
}

/// Mailer trait for sending emails
///
/// Implement this trait to plug in a custom provider backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send an email
    ///
    /// Returns `Ok(())` if the provider accepted the message.
    async fn send(&self, email: &Email) -> Result<()>;

    /// Check if the mailer backend is healthy/connected
    fn is_healthy(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_builder() {
        let email = Email::new("from@test.com", "to@test.com", "Subject")
            .text("plain body")
            .reply_to("reply@test.com")
            .attachment(Attachment {
                filename: "invoice.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: vec![0x25, 0x50, 0x44, 0x46],
            });

        assert_eq!(email.from, "from@test.com");
        assert_eq!(email.to, vec!["to@test.com"]);
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].filename, "invoice.pdf");
    }

    #[test]
    fn test_validation_requires_body() {
        let email = Email::new("from@test.com", "to@test.com", "Subject");
        assert!(email.validate().is_err());
    }

    #[test]
    fn test_validation_requires_recipient() {
        let email = Email {
            from: "from@test.com".to_string(),
            to: vec![],
            subject: "Subject".to_string(),
            text: Some("body".to_string()),
            html: None,
            reply_to: None,
            attachments: vec![],
        };
        let err = email.validate().unwrap_err();
        assert!(err.to_string().contains("'to' is required"));
    }
}
