//! Client records: the people and companies a freelancer bills.
//!
//! Plain pass-through persistence; every operation is scoped to the
//! authenticated owner.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppContext;
use crate::auth::AuthUser;
use crate::error::{ApiError, Result};
use crate::http::AppJson;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub address_lines: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[serde(default)]
    pub address_lines: Vec<String>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_clients).post(create_client))
        .route(
            "/{id}",
            get(get_client).put(update_client).delete(delete_client),
        )
}

async fn list_clients(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Client>>> {
    Ok(Json(ctx.store.list_clients(user_id).await?))
}

async fn create_client(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    AppJson(input): AppJson<ClientInput>,
) -> Result<Json<Client>> {
    input.validate()?;
    Ok(Json(ctx.store.insert_client(user_id, input).await?))
}

async fn get_client(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>> {
    let client = ctx
        .store
        .find_client(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("client not found"))?;
    Ok(Json(client))
}

async fn update_client(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<ClientInput>,
) -> Result<Json<Client>> {
    input.validate()?;
    Ok(Json(ctx.store.update_client(id, user_id, input).await?))
}

async fn delete_client(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    ctx.store.delete_client(id, user_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
