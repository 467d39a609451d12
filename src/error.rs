use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// The main error type for fakturo request handling.
///
/// Every variant maps to a stable machine-readable `code` that clients key
/// their behavior on; messages are human-readable and never load-bearing.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Request body exceeds the configured maximum size")]
    PayloadTooLarge,

    #[error("Too many requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Invoice status '{0}' does not allow finalization")]
    InvoiceLockInvalidStatus(String),

    #[error("Invoice is locked; its content can no longer be changed")]
    InvoiceLockedContent,

    #[error("Invoice number cannot be changed once assigned")]
    InvoiceNumberImmutable,

    #[error("Status transition not allowed: {from} -> {to}")]
    StatusTransitionNotAllowed { from: String, to: String },

    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Wire format: `{"error": {"code", "message", "retryAfterSeconds"?}}`.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The stable machine-readable code for this error.
    ///
    /// Codes are part of the public API contract; the front end maps them to
    /// localized text and must never parse messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "NOT_AUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::PayloadTooLarge => "payload_too_large",
            Self::RateLimited { .. } => "RATE_LIMIT",
            Self::InvoiceLockInvalidStatus(_) => "INVOICE_LOCK_INVALID_STATUS",
            Self::InvoiceLockedContent => "INVOICE_LOCKED_CONTENT",
            Self::InvoiceNumberImmutable => "INVOICE_NUMBER_IMMUTABLE",
            Self::StatusTransitionNotAllowed { .. } => "status_transition_not_allowed",
            Self::EmailDelivery(_) => "EMAIL_SEND_FAILED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) | Self::Anyhow(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::InvoiceLockInvalidStatus(_)
            | Self::InvoiceLockedContent
            | Self::InvoiceNumberImmutable
            | Self::StatusTransitionNotAllowed { .. } => StatusCode::CONFLICT,
            Self::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for client responses.
    ///
    /// 4xx messages are useful to the caller and pass through; 5xx details
    /// stay server-side to avoid leaking internals (CWE-209) and are
    /// replaced with a generic message.
    fn safe_message(&self) -> String {
        if self.status_code().is_server_error() {
            match self {
                Self::Storage(_) => "Storage error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), code = self.code(), error = %self, "request rejected");
        }

        let retry_after = self.retry_after_seconds();
        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.safe_message(),
                retry_after_seconds: retry_after,
            },
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for fakturo handlers and services.
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("record not found".to_string()),
            sqlx::Error::Database(db) => {
                // The invoice guard trigger raises with these markers; map them
                // back onto their API codes instead of a generic storage error.
                let msg = db.message();
                if msg.contains("INVOICE_LOCKED_CONTENT") {
                    ApiError::InvoiceLockedContent
                } else if msg.contains("INVOICE_NUMBER_IMMUTABLE") {
                    ApiError::InvoiceNumberImmutable
                } else {
                    ApiError::Storage(format!("database error: {}", msg))
                }
            }
            _ => ApiError::Storage(format!("database error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            ApiError::Validation(format!("JSON error: {}", err))
        } else {
            ApiError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field_errors: Vec<String> = err
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let messages: Vec<&str> = errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.as_ref()))
                    .collect();
                if messages.is_empty() {
                    format!("{}: invalid", field)
                } else {
                    format!("{}: {}", field, messages.join(", "))
                }
            })
            .collect();

        ApiError::Validation(field_errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ApiError::NotAuthenticated.code(), "NOT_AUTHENTICATED");
        assert_eq!(ApiError::PayloadTooLarge.code(), "payload_too_large");
        assert_eq!(
            ApiError::RateLimited {
                retry_after_seconds: 3
            }
            .code(),
            "RATE_LIMIT"
        );
        assert_eq!(ApiError::InvoiceLockedContent.code(), "INVOICE_LOCKED_CONTENT");
        assert_eq!(
            ApiError::InvoiceLockInvalidStatus("paid".into()).code(),
            "INVOICE_LOCK_INVALID_STATUS"
        );
        assert_eq!(
            ApiError::StatusTransitionNotAllowed {
                from: "paid".into(),
                to: "draft".into()
            }
            .code(),
            "status_transition_not_allowed"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotAuthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::PayloadTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::RateLimited {
                retry_after_seconds: 1
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::InvoiceLockedContent.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::storage("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_safe_message_hides_storage_details() {
        let err = ApiError::storage("connection to db-prod-01:5432 refused");
        assert_eq!(err.safe_message(), "Storage error");

        let err = ApiError::validation("subject is required");
        assert!(err.safe_message().contains("subject is required"));
    }

    #[tokio::test]
    async fn test_rate_limit_response_shape() {
        let err = ApiError::RateLimited {
            retry_after_seconds: 42,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "RATE_LIMIT");
        assert_eq!(json["error"]["retryAfterSeconds"], 42);
    }

    #[tokio::test]
    async fn test_payload_too_large_response_shape() {
        let response = ApiError::PayloadTooLarge.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "payload_too_large");
        assert!(json["error"].get("retryAfterSeconds").is_none());
    }

    #[test]
    fn test_from_validator_errors() {
        use validator::Validate;

        #[derive(Validate)]
        struct Form {
            #[validate(length(min = 1, message = "must not be empty"))]
            subject: String,
        }

        let form = Form {
            subject: String::new(),
        };
        let err: ApiError = form.validate().unwrap_err().into();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("subject"));
    }
}
