//! Speech synthesis and voice conversion. Each successful call lands in the
//! caller's history; failures leave it untouched.

use axum::{
    Json,
    extract::{Multipart, State},
};
use std::sync::Arc;

use super::session::SessionGate;
use super::validation::validate_voice_settings_json;
use super::{ApiError, ApiResponse, AppState, GenerationDto, SpeechRequestDto};
use crate::models::VoiceSettings;
use crate::services::{ConversionRequest, SpeechRequest};

/// POST /generate/speech
pub async fn generate_speech(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
    Json(payload): Json<SpeechRequestDto>,
) -> Result<Json<ApiResponse<GenerationDto>>, ApiError> {
    let account = gate.require_account()?;

    let record = state
        .generation_service()
        .synthesize(
            &account,
            SpeechRequest {
                text: payload.text,
                voice_id: payload.voice_id,
                model_id: payload.model_id,
                settings: payload.voice_settings,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(GenerationDto::from(&*record))))
}

/// POST /generate/conversion
///
/// Multipart fields: `audio` (file), `voice_id`, optional `model_id` and
/// `voice_settings` (JSON object).
pub async fn generate_conversion(
    State(state): State<Arc<AppState>>,
    gate: SessionGate,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<GenerationDto>>, ApiError> {
    let account = gate.require_account()?;

    let mut audio: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut voice_id = None;
    let mut model_id = None;
    let mut settings = VoiceSettings::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;
                audio = Some((bytes.to_vec(), file_name, content_type));
            }
            "voice_id" => voice_id = Some(read_text(field).await?),
            "model_id" => {
                let value = read_text(field).await?;
                model_id = (!value.trim().is_empty()).then_some(value);
            }
            "voice_settings" => {
                settings = validate_voice_settings_json(&read_text(field).await?)?;
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    let (audio, file_name, content_type) =
        audio.ok_or_else(|| ApiError::validation("Please upload an audio file to convert"))?;
    let voice_id = voice_id.ok_or_else(|| ApiError::validation("Please select a voice"))?;

    let record = state
        .generation_service()
        .convert(
            &account,
            ConversionRequest {
                voice_id,
                model_id,
                settings,
                audio,
                file_name,
                content_type,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(GenerationDto::from(&*record))))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::validation(format!("Malformed upload field: {e}")))
}
