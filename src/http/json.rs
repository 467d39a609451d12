//! JSON body extraction with stable error codes.
//!
//! Axum's `Json` rejections carry framework-worded messages and plain-text
//! bodies; this wrapper maps them onto the application's error taxonomy so
//! every failure reaches clients as `{"error":{"code",...}}`. In
//! particular, a body that exceeds the configured size limit surfaces as
//! `payload_too_large` before any field-level validation runs.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// JSON extractor with application-taxonomy rejections.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_rejection(rejection)),
        }
    }
}

fn map_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::Validation(rejection.body_text())
    }
}
