use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::session::SessionGate;
use super::validation::validate_limit;
use super::{ApiError, ApiResponse, AppState, GenerationDto};
use crate::constants::audio::OUTPUT_MIME;
use crate::models::GenerationKind;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_kind")]
    pub kind: GenerationKind,
    pub limit: Option<usize>,
}

const fn default_kind() -> GenerationKind {
    GenerationKind::TextToSpeech
}

/// GET /history
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<GenerationDto>>>, ApiError> {
    let account = gate.require_account()?;
    let window = &state.config().history;
    let limit = validate_limit(query.limit.unwrap_or(window.recent_limit), window.max_limit)?;

    let records = state.history().recent(account.account_id, query.kind, limit).await;
    Ok(Json(ApiResponse::success(
        records.iter().map(|r| GenerationDto::from(&**r)).collect(),
    )))
}

/// GET /history/{id}/audio
pub async fn download_audio(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let account = gate.require_account()?;

    // Other users' records are indistinguishable from missing ones.
    let record = state
        .history()
        .find(account.account_id, id)
        .await
        .ok_or_else(|| ApiError::not_found("Generation", id))?;

    let disposition = format!("attachment; filename=\"{}\"", record.download_name());

    Ok((
        [
            (header::CONTENT_TYPE, OUTPUT_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        record.audio_payload.clone(),
    ))
}
