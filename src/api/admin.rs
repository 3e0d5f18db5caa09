//! User management endpoints. Only reachable for admins who have switched
//! their session into the directory view.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::session::SessionGate;
use super::{ApiError, ApiResponse, AppState, SessionDto, UserDto};
use crate::services::NewUser;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user: UserDto,
    pub persisted: bool,
}

#[derive(Serialize)]
pub struct DeleteUserResponse {
    pub username: String,
    pub purged_generations: usize,
    pub persisted: bool,
}

/// POST /admin/open
pub async fn open_directory(
    mut gate: SessionGate,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    if !gate.open_directory().await? {
        return Err(ApiError::forbidden("Administrator access required"));
    }

    Ok(Json(ApiResponse::success(SessionDto::from(gate.state()))))
}

/// POST /admin/close
pub async fn return_to_main(
    mut gate: SessionGate,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    gate.return_to_main().await?;
    Ok(Json(ApiResponse::success(SessionDto::from(gate.state()))))
}

/// GET /admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    gate.require_admin_view()?;

    let users = state.directory_service().list_users().await?;
    Ok(Json(ApiResponse::success(
        users.iter().map(UserDto::from).collect(),
    )))
}

/// POST /admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<CreateUserResponse>>, ApiError> {
    let admin = gate.require_admin_view()?;

    let created = state
        .directory_service()
        .create_user(NewUser {
            username: payload.username,
            password: payload.password,
            is_admin: payload.is_admin,
        })
        .await?;

    tracing::info!(
        admin,
        username = %created.user.username,
        persisted = created.persisted,
        "Account created from user management"
    );

    Ok(Json(ApiResponse::success(CreateUserResponse {
        user: UserDto::from(&created.user),
        persisted: created.persisted,
    })))
}

/// DELETE /admin/users/{username}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<DeleteUserResponse>>, ApiError> {
    let admin = gate.require_admin_view()?;

    let deleted = state
        .directory_service()
        .delete_user(&username, admin)
        .await?;

    Ok(Json(ApiResponse::success(DeleteUserResponse {
        username: deleted.username,
        purged_generations: deleted.purged_generations,
        persisted: deleted.persisted,
    })))
}
