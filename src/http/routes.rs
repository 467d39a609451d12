//! API route assembly.

use axum::{
    routing::{get, post},
    Router,
};

use crate::app::AppContext;

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .nest("/api/clients", crate::clients::routes())
        .nest("/api/projects", crate::projects::routes())
        .nest("/api/offers", crate::offers::routes())
        .nest("/api/invoices", crate::invoices::routes())
        .route("/api/email", post(crate::email::send_email_handler))
        .route(
            "/api/documents/{kind}/{id}/pdf",
            get(crate::documents::download_pdf_handler),
        )
}
