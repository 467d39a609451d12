//! Projects group offers and invoices under a client engagement.

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

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub client_id: Uuid,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_projects).post(create_project))
        .route(
            "/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
}

async fn list_projects(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Project>>> {
    Ok(Json(ctx.store.list_projects(user_id).await?))
}

async fn create_project(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    AppJson(input): AppJson<ProjectInput>,
) -> Result<Json<Project>> {
    input.validate()?;
    Ok(Json(ctx.store.insert_project(user_id, input).await?))
}

async fn get_project(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>> {
    let project = ctx
        .store
        .find_project(id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("project not found"))?;
    Ok(Json(project))
}

async fn update_project(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    AppJson(input): AppJson<ProjectInput>,
) -> Result<Json<Project>> {
    input.validate()?;
    Ok(Json(ctx.store.update_project(id, user_id, input).await?))
}

async fn delete_project(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    ctx.store.delete_project(id, user_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
