use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clients::Voice;
use crate::models::generation::ModelOption;
use crate::models::{GenerationKind, GenerationRecord, UserSummary, VoiceSettings};
use crate::session::{SessionState, ViewMode};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub logged_in: bool,
    pub username: Option<String>,
    pub is_admin: bool,
    pub view_mode: ViewMode,
}

impl From<&SessionState> for SessionDto {
    fn from(state: &SessionState) -> Self {
        Self {
            logged_in: state.logged_in,
            username: state.username().map(str::to_string),
            is_admin: state.logged_in && state.is_admin,
            view_mode: state.view_mode,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub username: String,
    pub role: &'static str,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserSummary> for UserDto {
    fn from(user: &UserSummary) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role(),
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VoiceDto {
    pub voice_id: String,
    pub name: String,
}

impl From<Voice> for VoiceDto {
    fn from(voice: Voice) -> Self {
        Self {
            voice_id: voice.voice_id,
            name: voice.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelDto {
    pub model_id: &'static str,
    pub name: &'static str,
    pub is_default: bool,
}

impl From<&ModelOption> for ModelDto {
    fn from(model: &ModelOption) -> Self {
        Self {
            model_id: model.id,
            name: model.name,
            is_default: model.id == crate::models::generation::default_model().id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerationDto {
    pub id: Uuid,
    pub kind: GenerationKind,
    pub label: String,
    pub voice_name: String,
    pub model_name: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub audio_url: String,
}

impl From<&GenerationRecord> for GenerationDto {
    fn from(record: &GenerationRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            label: record.prompt_or_source.clone(),
            voice_name: record.voice_name.clone(),
            model_name: record.model_name.clone(),
            size_bytes: record.audio_payload.len(),
            created_at: record.created_at,
            audio_url: format!("/api/history/{}/audio", record.id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SpeechRequestDto {
    pub text: String,
    pub voice_id: String,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub voice_settings: VoiceSettings,
}
