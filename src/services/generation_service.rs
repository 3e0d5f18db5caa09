//! Runs synthesis and conversion requests against the voice provider and
//! records the successful ones in the caller's history.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::{ConversionInput, ProviderError, SynthesisInput, VoiceProvider};
use crate::constants::audio::ACCEPTED_UPLOAD_EXTENSIONS;
use crate::history::GenerationHistory;
use crate::models::generation::{ModelOption, default_model, find_model};
use crate::models::{AccountRef, GenerationRecord, VoiceSettings};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Account no longer exists")]
    OwnerRemoved,
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: Option<String>,
    pub settings: VoiceSettings,
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub voice_id: String,
    pub model_id: Option<String>,
    pub settings: VoiceSettings,
    pub audio: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

pub struct GenerationService {
    provider: Arc<dyn VoiceProvider>,
    history: Arc<GenerationHistory>,
}

impl GenerationService {
    #[must_use]
    pub fn new(provider: Arc<dyn VoiceProvider>, history: Arc<GenerationHistory>) -> Self {
        Self { provider, history }
    }

    pub async fn synthesize(
        &self,
        owner: &AccountRef,
        request: SpeechRequest,
    ) -> Result<Arc<GenerationRecord>, GenerationError> {
        let username = owner.username.as_str();
        if request.text.trim().is_empty() {
            return Err(GenerationError::Validation(
                "Please enter some text to convert to speech".to_string(),
            ));
        }
        validate_voice_id(&request.voice_id)?;
        let model = resolve_model(request.model_id.as_deref())?;

        let input = SynthesisInput {
            voice_id: request.voice_id.clone(),
            model_id: model.id.to_string(),
            text: request.text.clone(),
            settings: request.settings.clamped(),
        };

        let audio = self.provider.synthesize(&input).await.inspect_err(|e| {
            metrics::counter!("provider_failures_total", "operation" => "synthesize").increment(1);
            warn!(username, error = %e, "Speech synthesis failed");
        })?;

        let voice_name = self.voice_name(&request.voice_id).await;
        let record = self
            .history
            .append(
                owner.account_id,
                GenerationRecord::text_to_speech(&request.text, voice_name, model.name, audio),
            )
            .await
            .ok_or(GenerationError::OwnerRemoved)?;

        info!(
            username,
            id = %record.id,
            voice = %record.voice_name,
            bytes = record.audio_payload.len(),
            "Speech generated"
        );
        Ok(record)
    }

    pub async fn convert(
        &self,
        owner: &AccountRef,
        request: ConversionRequest,
    ) -> Result<Arc<GenerationRecord>, GenerationError> {
        let username = owner.username.as_str();
        if request.audio.is_empty() {
            return Err(GenerationError::Validation(
                "Please upload an audio file to convert".to_string(),
            ));
        }
        validate_voice_id(&request.voice_id)?;
        let model = resolve_model(request.model_id.as_deref())?;
        let content_type = upload_content_type(&request.file_name, request.content_type.as_deref())?;

        let input = ConversionInput {
            voice_id: request.voice_id.clone(),
            model_id: model.id.to_string(),
            audio: request.audio,
            file_name: request.file_name,
            content_type,
            settings: request.settings.clamped(),
        };

        let audio = self.provider.convert(&input).await.inspect_err(|e| {
            metrics::counter!("provider_failures_total", "operation" => "convert").increment(1);
            warn!(username, error = %e, "Voice conversion failed");
        })?;

        let voice_name = self.voice_name(&request.voice_id).await;
        let record = self
            .history
            .append(
                owner.account_id,
                GenerationRecord::voice_conversion(voice_name, model.name, audio),
            )
            .await
            .ok_or(GenerationError::OwnerRemoved)?;

        info!(
            username,
            id = %record.id,
            voice = %record.voice_name,
            bytes = record.audio_payload.len(),
            "Voice converted"
        );
        Ok(record)
    }

    /// Display name for a voice id, or the id itself when the voice list is
    /// unavailable or does not contain it.
    async fn voice_name(&self, voice_id: &str) -> String {
        match self.provider.list_voices().await {
            Ok(voices) => voices
                .into_iter()
                .find(|v| v.voice_id == voice_id)
                .map_or_else(|| voice_id.to_string(), |v| v.name),
            Err(e) => {
                warn!(voice_id, error = %e, "Could not resolve voice name");
                voice_id.to_string()
            }
        }
    }
}

fn resolve_model(model_id: Option<&str>) -> Result<&'static ModelOption, GenerationError> {
    match model_id.filter(|id| !id.is_empty()) {
        None => Ok(default_model()),
        Some(id) => find_model(id)
            .ok_or_else(|| GenerationError::Validation(format!("Unknown model: {id}"))),
    }
}

/// Voice ids end up in the request path, so only URL-safe ids are accepted.
fn validate_voice_id(voice_id: &str) -> Result<(), GenerationError> {
    if voice_id.is_empty() {
        return Err(GenerationError::Validation(
            "Please select a voice".to_string(),
        ));
    }

    if !voice_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(GenerationError::Validation(format!(
            "Invalid voice id: {voice_id}"
        )));
    }

    Ok(())
}

fn upload_content_type(
    file_name: &str,
    declared: Option<&str>,
) -> Result<String, GenerationError> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if !ACCEPTED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        return Err(GenerationError::Validation(format!(
            "Unsupported audio file '{file_name}'. Upload an MP3, WAV, or M4A file"
        )));
    }

    let fallback = match extension.as_str() {
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        _ => "audio/mpeg",
    };

    Ok(declared
        .filter(|ct| ct.starts_with("audio/"))
        .unwrap_or(fallback)
        .to_string())
}
