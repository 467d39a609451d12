//! Payload guard: reject oversized request bodies before parsing.
//!
//! Two lines of defense, both running before any JSON is parsed:
//! this middleware rejects requests whose declared `Content-Length`
//! already exceeds the cap (without reading a byte of the body), and
//! `DefaultBodyLimit` bounds the measured size for chunked bodies, whose
//! rejection `AppJson` maps to the same `payload_too_large` code.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::app::AppContext;
use crate::error::{ApiError, Result};

pub async fn payload_guard(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let max_bytes = ctx.config.server.max_body_bytes;

    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    if let Some(length) = declared {
        if length > max_bytes {
            return Err(ApiError::PayloadTooLarge);
        }
    }

    Ok(next.run(req).await)
}
