use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, ModelDto, VoiceDto};
use crate::models::generation::MODEL_CATALOG;

/// GET /voices
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<VoiceDto>>>, ApiError> {
    let voices = state.provider().list_voices().await?;
    Ok(Json(ApiResponse::success(
        voices.into_iter().map(VoiceDto::from).collect(),
    )))
}

/// GET /models
pub async fn list_models() -> Json<ApiResponse<Vec<ModelDto>>> {
    Json(ApiResponse::success(
        MODEL_CATALOG.iter().map(ModelDto::from).collect(),
    ))
}
