use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::session::SessionGate;
use super::{ApiError, ApiResponse, AppState, MessageResponse, SessionDto};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub is_admin: bool,
}

// ============================================================================
// Middleware
// ============================================================================

/// Rejects requests without a logged-in session. A session whose account
/// was deleted, replaced by a new account of the same name, or changed role
/// since login is ended here.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut gate: SessionGate,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let username = gate.require_user()?.to_string();

    let current = state.auth_service().account(&username).await?;
    if !current.is_some_and(|user| gate.state().matches(&user)) {
        tracing::info!(username = %username, "Ending session of a stale account");
        gate.clear().await?;
        return Err(ApiError::unauthorized());
    }

    tracing::Span::current().record("user_id", &username);
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    mut gate: SessionGate,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let user = state
        .auth_service()
        .login(&payload.username, &payload.password)
        .await?;

    gate.establish(&user).await?;

    Ok(Json(ApiResponse::success(LoginResponse {
        username: user.username,
        is_admin: user.is_admin,
    })))
}

/// POST /auth/logout
pub async fn logout(mut gate: SessionGate) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if let Some(username) = gate.state().username() {
        tracing::info!(username, "User logged out");
    }
    gate.clear().await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Logged out",
    ))))
}

/// GET /auth/session
pub async fn current_session(
    State(state): State<Arc<AppState>>,
    mut gate: SessionGate,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    if let Some(username) = gate.state().username().map(str::to_string) {
        let current = state.auth_service().account(&username).await?;
        if !current.is_some_and(|user| gate.state().matches(&user)) {
            gate.clear().await?;
        }
    }

    Ok(Json(ApiResponse::success(SessionDto::from(gate.state()))))
}
