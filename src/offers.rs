//! Offers (quotes) sent to clients before work begins.
//!
//! Offers are sendable documents but never lock: accepting or rejecting an
//! offer is an ordinary status change, unlike the invoice finalize flow.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppContext;
use crate::auth::AuthUser;
use crate::documents::Position;
use crate::error::{ApiError, Result};
use crate::http::AppJson;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Draft,
    Sent,
    Accepted,
    Rejected,
}

impl OfferStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for OfferStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ApiError::validation(format!("invalid offer status: '{}'", s))),
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub number: Option<String>,
    pub status: OfferStatus,
    pub positions: Vec<Position>,
    pub total_cents: i64,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OfferInput {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub number: Option<String>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[validate(length(min = 3, max = 3, message = "must be a 3-letter currency code"))]
    #[serde(default = "default_currency")]
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Deserialize)]
struct OfferStatusInput {
    status: OfferStatus,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_offers).post(create_offer))
        .route("/{id}", get(get_offer).put(update_offer).delete(delete_offer))
        .route("/{id}/status", axum::routing::patch(set_offer_status))
}

async fn list_offers(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Offer>>> {
    Ok(Json(ctx.store.list_offers(user_id).await?))
}

async fn create_offer(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    AppJson(input): AppJson<OfferInput>,
) -> Result<Json<Offer>> {
    input.validate()?;
    Ok(Json(ctx.store.insert_offer(user_id, input).await?))
}

async fn get_offer(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Offer>> {
    let offer = ctx
        .store
        .find_offer(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("offer not found"))?;
    Ok(Json(offer))
}

async fn update_offer(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<OfferInput>,
) -> Result<Json<Offer>> {
    input.validate()?;
    Ok(Json(ctx.store.update_offer(id, user_id, input).await?))
}

async fn delete_offer(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    ctx.store.delete_offer(id, user_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn set_offer_status(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<OfferStatusInput>,
) -> Result<Json<Offer>> {
    let offer = ctx.store.set_offer_status(id, user_id, input.status).await?;
    Ok(Json(offer))
}
