//! JWT bearer authentication.
//!
//! Every API operation is scoped to the authenticated user's id; this is
//! the application end of the row-level security the schema enforces. The
//! `AuthUser` extractor rejects missing or invalid tokens with
//! `NOT_AUTHENTICATED` before handlers run.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppContext;
use crate::error::{ApiError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub sub: Uuid,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Issue a signed token for a user. Used by session bootstrap and tests.
pub fn issue_token(secret: &str, user_id: Uuid, ttl: std::time::Duration) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: Utc::now().timestamp() + ttl.as_secs() as i64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("failed to sign token: {}", e)))
}

/// The authenticated caller, extracted from the `Authorization` header.
pub struct AuthUser(pub Uuid);

impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::NotAuthenticated)?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(ApiError::NotAuthenticated)?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(ctx.config.auth.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::NotAuthenticated)?;

        Ok(AuthUser(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_decode_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_token("secret", user_id, std::time::Duration::from_secs(60)).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user_id);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token =
            issue_token("secret", Uuid::new_v4(), std::time::Duration::from_secs(60)).unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
