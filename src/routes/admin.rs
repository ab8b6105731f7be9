//! Moderation endpoints. Pin, lock and post removal need MOD; thread
//! deletion and role changes need ADMIN.

use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::users;
use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::{Admin, Moderator, PathId};
use crate::forum::repository;
use crate::routes::auth::UserPayload;
use crate::state::AppState;
use crate::validation::{Validate, ValidJson, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

impl Validate for RoleRequest {
    type Output = Role;

    fn validate(self) -> Result<Role, ValidationErrors> {
        self.role.parse::<Role>().map_err(|_| {
            let mut errors = ValidationErrors::default();
            errors.field("role", "must be one of USER, MOD, ADMIN");
            errors
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/threads/{id}/pin", post(toggle_pin))
        .route("/api/admin/threads/{id}/lock", post(toggle_lock))
        .route("/api/admin/threads/{id}", delete(delete_thread))
        .route("/api/admin/posts/{id}", delete(delete_post))
        .route("/api/admin/users/{id}/role", post(set_role))
}

async fn toggle_pin(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    PathId(id): PathId,
) -> AppResult<Json<Value>> {
    let pinned = {
        let conn = state.db.get()?;
        repository::toggle_pin(&conn, id)?
    };
    tracing::info!(
        "Thread {} pinned={} by {}",
        id,
        pinned,
        moderator.user.username
    );
    Ok(Json(json!({ "success": true, "isPinned": pinned })))
}

async fn toggle_lock(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    PathId(id): PathId,
) -> AppResult<Json<Value>> {
    let locked = {
        let conn = state.db.get()?;
        repository::toggle_lock(&conn, id)?
    };
    tracing::info!(
        "Thread {} locked={} by {}",
        id,
        locked,
        moderator.user.username
    );
    Ok(Json(json!({ "success": true, "isLocked": locked })))
}

async fn delete_post(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    PathId(id): PathId,
) -> AppResult<Json<Value>> {
    let post = {
        let conn = state.db.get()?;
        repository::soft_delete_post(&conn, id)?
    };
    tracing::info!("Post {} deleted by {}", id, moderator.user.username);
    Ok(Json(json!({ "success": true, "post": post })))
}

async fn delete_thread(
    State(state): State<AppState>,
    Admin(admin): Admin,
    PathId(id): PathId,
) -> AppResult<Json<Value>> {
    {
        let mut conn = state.db.get()?;
        repository::delete_thread(&mut conn, id)?;
    }
    tracing::info!("Thread {} removed by {}", id, admin.user.username);
    Ok(Json(json!({ "success": true })))
}

async fn set_role(
    State(state): State<AppState>,
    Admin(admin): Admin,
    Path(user_id): Path<String>,
    ValidJson(role): ValidJson<RoleRequest>,
) -> AppResult<Json<Value>> {
    let updated = {
        let conn = state.db.get()?;
        users::set_role(&conn, &user_id, role)?
    }
    .ok_or_else(|| AppError::not_found("User"))?;

    tracing::info!(
        "Role of {} set to {} by {}",
        updated.username,
        role,
        admin.user.username
    );
    Ok(Json(json!({ "user": UserPayload::from(updated) })))
}
