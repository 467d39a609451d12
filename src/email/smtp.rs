//! SMTP mailer using lettre
//!
//! Sends emails (including PDF attachments) via an SMTP relay.

use crate::error::{ApiError, Result};
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname
    pub host: String,
    /// SMTP server port (default: 587 for STARTTLS)
    pub port: u16,
    /// Username for authentication
    pub username: Option<String>,
    /// Password for authentication
    pub password: Option<String>,
    /// Default "from" address
    pub default_from: Option<String>,
    /// Use STARTTLS (default: true)
    pub starttls: bool,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
            default_from: None,
            starttls: true,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.default_from = Some(address.into());
        self
    }

    pub fn no_starttls(mut self) -> Self {
        self.starttls = false;
        self
    }

    /// Create config from environment variables
    ///
    /// Reads `SMTP_HOST` (required), `SMTP_PORT`, `SMTP_USERNAME`,
    /// `SMTP_PASSWORD`, `SMTP_FROM`, `SMTP_STARTTLS`.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| ApiError::internal("SMTP_HOST environment variable not set"))?;

        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").ok();
        let password = std::env::var("SMTP_PASSWORD").ok();
        let default_from = std::env::var("SMTP_FROM").ok();
        let starttls = std::env::var("SMTP_STARTTLS")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            username,
            password,
            default_from,
            starttls,
        })
    }
}

/// SMTP mailer using lettre's async transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| ApiError::internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| ApiError::internal(format!("Failed to create SMTP transport: {}", e)))?
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let credentials = Credentials::new(username.clone(), password.clone());
            builder = builder.credentials(credentials);
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_message(&self, email: &Email) -> Result<Message> {
        let from_str = if email.from.is_empty() {
            self.config.default_from.as_ref().ok_or_else(|| {
                ApiError::validation("no 'from' address specified and no default configured")
            })?
        } else {
            &email.from
        };

        let from: Mailbox = from_str
            .parse()
            .map_err(|e| ApiError::validation(format!("invalid 'from' address: {}", e)))?;

        let mut builder = Message::builder().from(from).subject(&email.subject);

        for to in &email.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| ApiError::validation(format!("invalid 'to' address '{}': {}", to, e)))?;
            builder = builder.to(mailbox);
        }

        if let Some(ref reply_to) = email.reply_to {
            let mailbox: Mailbox = reply_to
                .parse()
                .map_err(|e| ApiError::validation(format!("invalid 'reply_to' address: {}", e)))?;
            builder = builder.reply_to(mailbox);
        }

        // Body: multipart/alternative when both text and HTML are present
        let body_part = match (&email.text, &email.html) {
            (Some(text), Some(html)) => MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                ),
            (Some(text), None) => MultiPart::mixed().singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(text.clone()),
            ),
            (None, Some(html)) => MultiPart::mixed().singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html.clone()),
            ),
            (None, None) => {
                return Err(ApiError::validation("email must have either text or HTML body"));
            }
        };

        // Wrap body and attachments into multipart/mixed
        let mut mixed = MultiPart::mixed().multipart(body_part);
        for attachment in &email.attachments {
            let content_type = attachment
                .content_type
                .parse::<ContentType>()
                .map_err(|e| {
                    ApiError::validation(format!(
                        "invalid attachment content type '{}': {}",
                        attachment.content_type, e
                    ))
                })?;
            mixed = mixed.singlepart(
                LettreAttachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }

        builder
            .multipart(mixed)
            .map_err(|e| ApiError::internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ApiError::EmailDelivery(e.to_string()))?;

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

// AsyncSmtpTransport doesn't impl Debug
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::mailer::Attachment;

    #[test]
    fn test_build_message_with_attachment() {
        let mailer = SmtpMailer::new(SmtpConfig::new("smtp.example.com")).unwrap();
        let email = Email::new("from@example.com", "to@example.com", "Invoice 2026-0001")
            .text("attached")
            .attachment(Attachment {
                filename: "invoice-2026-0001.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                data: b"%PDF-1.7 fake".to_vec(),
            });

        let message = mailer.build_message(&email).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("invoice-2026-0001.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let mailer = SmtpMailer::new(SmtpConfig::new("smtp.example.com")).unwrap();
        let email = Email::new("from@example.com", "not-an-address", "Hi").text("x");
        assert!(mailer.build_message(&email).is_err());
    }
}
