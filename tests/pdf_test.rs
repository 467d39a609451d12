//! Determinism of the PDF generation path.

mod common;
use common::*;

use axum::http::StatusCode;
use fakturo::documents::{pdf_attachment, render_pdf, DocumentKind};
use fakturo::testing::fixtures;
use fakturo::traits::store::AppStore;

#[tokio::test]
async fn test_same_payload_renders_identical_bytes() {
    let app = test_app();
    fixtures::seed_identity(&app.store, app.user_id).await;
    let client = fixtures::seed_client(&app.store, app.user_id).await;
    let invoice = fixtures::seed_invoice(&app.store, app.user_id, client.id).await;

    let first = app
        .store
        .load_document_payload(DocumentKind::Invoice, invoice.id, app.user_id)
        .await
        .unwrap()
        .unwrap();
    let second = app
        .store
        .load_document_payload(DocumentKind::Invoice, invoice.id, app.user_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first, second, "loading twice yields the same payload");
    assert_eq!(
        render_pdf(&first).unwrap(),
        render_pdf(&second).unwrap(),
        "rendering is a pure function of the payload"
    );
}

#[tokio::test]
async fn test_attachment_and_render_share_one_path() {
    let app = test_app();
    fixtures::seed_identity(&app.store, app.user_id).await;
    let client = fixtures::seed_client(&app.store, app.user_id).await;
    let invoice = fixtures::seed_invoice(&app.store, app.user_id, client.id).await;

    let payload = app
        .store
        .load_document_payload(DocumentKind::Invoice, invoice.id, app.user_id)
        .await
        .unwrap()
        .unwrap();

    let attachment = pdf_attachment(&payload).unwrap();
    assert_eq!(attachment.buffer, render_pdf(&payload).unwrap());
    assert_eq!(attachment.filename, "invoice-2026-0001.pdf");
}

#[tokio::test]
async fn test_download_requires_auth_and_known_document() {
    let app = test_app();
    fixtures::seed_identity(&app.store, app.user_id).await;
    let client = fixtures::seed_client(&app.store, app.user_id).await;
    let invoice = fixtures::seed_invoice(&app.store, app.user_id, client.id).await;

    let uri = format!("/api/documents/invoice/{}/pdf", invoice.id);
    let (status, body) = request_unauthenticated(&app, "GET", &uri, serde_json::json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "NOT_AUTHENTICATED");

    let uri = format!("/api/documents/invoice/{}/pdf", uuid::Uuid::new_v4());
    let (status, body) = request(&app, "GET", &uri, serde_json::json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let uri = format!("/api/documents/receipt/{}/pdf", invoice.id);
    let (status, body) = request(&app, "GET", &uri, serde_json::json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(&body), "VALIDATION");
}
