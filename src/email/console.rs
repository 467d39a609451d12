//! Console mailer for development
//!
//! Prints emails to stdout instead of sending them. Body content is
//! redacted by default since stdout often ends up in log aggregation.

use crate::error::Result;
use crate::traits::mailer::{Email, Mailer};
use async_trait::async_trait;

/// A mailer that prints emails to stdout instead of sending them.
///
/// FOR DEVELOPMENT USE ONLY.
#[derive(Debug, Clone)]
pub struct ConsoleMailer {
    show_full_content: bool,
}

impl ConsoleMailer {
    pub fn new() -> Self {
        Self {
            show_full_content: false,
        }
    }

    /// Show full email content instead of redacting bodies.
    pub fn with_full_output(mut self, show: bool) -> Self {
        self.show_full_content = show;
        self
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        email.validate()?;

        println!("=== EMAIL ===");
        println!("From:    {}", email.from);
        println!("To:      {}", email.to.join(", "));
        println!("Subject: {}", email.subject);
        if let Some(ref reply_to) = email.reply_to {
            println!("Reply-To: {}", reply_to);
        }
        for attachment in &email.attachments {
            println!(
                "Attachment: {} ({}, {} bytes)",
                attachment.filename,
                attachment.content_type,
                attachment.data.len()
            );
        }
        if self.show_full_content {
            if let Some(ref text) = email.text {
                println!("--- text ---\n{}", text);
            }
            if let Some(ref html) = email.html {
                println!("--- html ---\n{}", html);
            }
        } else {
            println!("(body redacted; enable full output to print it)");
        }
        println!("=============");

        Ok(())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
