//! Deterministic PDF rendering for offers and invoices.
//!
//! Rendering is a pure function of the payload: object ids are assigned in
//! a fixed order, no timestamps or random ids are embedded, and all money
//! arithmetic is integer cents. Calling [`render_pdf`] twice with the same
//! payload yields byte-identical output, which the finalization workflow
//! relies on (the mailed attachment equals the downloadable file).

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::{DocumentKind, DocumentPayload};
use crate::error::{ApiError, Result};

/// A rendered document ready to be attached to an email.
#[derive(Debug, Clone)]
pub struct PdfAttachment {
    pub buffer: Vec<u8>,
    pub filename: String,
}

/// Render a document payload to PDF bytes.
pub fn render_pdf(payload: &DocumentPayload) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.7");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let content = Content {
        operations: layout_operations(payload),
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content
            .encode()
            .map_err(|e| ApiError::internal(format!("PDF content encoding failed: {}", e)))?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ApiError::internal(format!("PDF serialization failed: {}", e)))?;
    Ok(buffer)
}

/// Render a payload and name the file after the document reference.
///
/// This is the single buffer-generation path: email attachments and direct
/// downloads both go through here.
pub fn pdf_attachment(payload: &DocumentPayload) -> Result<PdfAttachment> {
    let buffer = render_pdf(payload)?;
    let filename = format!(
        "{}-{}.pdf",
        payload.kind.as_str(),
        sanitize_filename(&payload.reference)
    );
    Ok(PdfAttachment { buffer, filename })
}

fn layout_operations(payload: &DocumentPayload) -> Vec<Operation> {
    let title = match payload.kind {
        DocumentKind::Invoice => format!("INVOICE {}", payload.reference),
        DocumentKind::Offer => format!("OFFER {}", payload.reference),
    };

    let mut lines: Vec<String> = Vec::new();
    lines.push(title);
    if let Some(issued_on) = &payload.issued_on {
        lines.push(format!("Date: {}", issued_on));
    }
    lines.push(String::new());

    if let Some(seller) = &payload.seller {
        lines.push(format!("From: {}", seller.name));
        for address_line in &seller.address_lines {
            lines.push(format!("      {}", address_line));
        }
        lines.push(String::new());
    }

    lines.push(format!("To: {}", payload.customer.name));
    for address_line in &payload.customer.address_lines {
        lines.push(format!("    {}", address_line));
    }
    lines.push(String::new());

    for position in &payload.positions {
        lines.push(format!(
            "{}  x{}  @ {}  =  {}",
            position.description,
            position.quantity,
            format_cents(position.unit_price_cents),
            format_cents(position.line_total_cents()),
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Total: {} {}",
        format_cents(payload.total_cents),
        payload.currency
    ));

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 11.into()]),
        Operation::new("Td", vec![50.into(), 790.into()]),
    ];
    for line in &lines {
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(printable(line))],
        ));
        operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}

/// Format cents as a decimal amount, e.g. `123456` -> `"1234.56"`.
fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Restrict text to printable ASCII so the built-in Helvetica encoding
/// renders it predictably.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

fn sanitize_filename(reference: &str) -> String {
    reference
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Party, Position};

    fn sample_payload() -> DocumentPayload {
        DocumentPayload {
            kind: DocumentKind::Invoice,
            reference: "2026-0007".to_string(),
            issued_on: Some("2026-08-01".to_string()),
            seller: Some(Party {
                name: "Mara Winter".to_string(),
                email: Some("mara@studio.example".to_string()),
                address_lines: vec!["Hafenstr. 12".to_string(), "20095 Hamburg".to_string()],
            }),
            customer: Party {
                name: "Acme GmbH".to_string(),
                email: Some("billing@acme.example".to_string()),
                address_lines: vec!["Musterweg 1".to_string()],
            },
            positions: vec![Position {
                description: "Brand design".to_string(),
                quantity: 2,
                unit_price_cents: 45_000,
            }],
            total_cents: 90_000,
            currency: "EUR".to_string(),
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let payload = sample_payload();
        let first = render_pdf(&payload).unwrap();
        let second = render_pdf(&payload).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_produces_a_pdf() {
        let bytes = render_pdf(&sample_payload()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
    }

    #[test]
    fn test_attachment_reuses_render_path() {
        let payload = sample_payload();
        let attachment = pdf_attachment(&payload).unwrap();
        assert_eq!(attachment.buffer, render_pdf(&payload).unwrap());
        assert_eq!(attachment.filename, "invoice-2026-0007.pdf");
    }

    #[test]
    fn test_different_payloads_differ() {
        let payload = sample_payload();
        let mut other = payload.clone();
        other.total_cents = 91_000;
        assert_ne!(render_pdf(&payload).unwrap(), render_pdf(&other).unwrap());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(123_456), "1234.56");
        assert_eq!(format_cents(-250), "-2.50");
    }

    #[test]
    fn test_filename_sanitization() {
        let mut payload = sample_payload();
        payload.reference = "20/26 #7".to_string();
        let attachment = pdf_attachment(&payload).unwrap();
        assert_eq!(attachment.filename, "invoice-20_26__7.pdf");
    }
}
