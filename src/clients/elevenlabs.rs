//! Client for the ElevenLabs text-to-speech and speech-to-speech API.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::constants::{audio::OUTPUT_MIME, provider::API_KEY_HEADER, provider::USER_AGENT};
use crate::models::VoiceSettings;

/// Longest slice of a provider error body carried into messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Voice provider API key is not configured")]
    Unconfigured,

    #[error("Voice provider request failed: {message}")]
    RequestFailed {
        status: Option<u16>,
        message: String,
    },
}

impl ProviderError {
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unconfigured => None,
            Self::RequestFailed { status, .. } => *status,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<Voice>,
}

#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub voice_id: String,
    pub model_id: String,
    pub text: String,
    pub settings: VoiceSettings,
}

#[derive(Debug, Clone)]
pub struct ConversionInput {
    pub voice_id: String,
    pub model_id: String,
    pub audio: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    pub settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

/// The external voice service as seen by the rest of the crate.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError>;

    /// Returns encoded audio (MP3).
    async fn synthesize(&self, input: &SynthesisInput) -> Result<Vec<u8>, ProviderError>;

    /// Re-voices an uploaded clip. Returns encoded audio (MP3).
    async fn convert(&self, input: &ConversionInput) -> Result<Vec<u8>, ProviderError>;
}

pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    voices_ttl: Duration,
    voices_cache: RwLock<Option<(Instant, Vec<Voice>)>>,
}

impl ElevenLabsClient {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build voice provider HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            voices_ttl: Duration::from_secs(config.voices_cache_ttl_seconds),
            voices_cache: RwLock::new(None),
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().ok_or(ProviderError::Unconfigured)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn cached_voices(&self) -> Option<Vec<Voice>> {
        let cache = self.voices_cache.read().await;
        cache
            .as_ref()
            .filter(|(fetched_at, _)| fetched_at.elapsed() < self.voices_ttl)
            .map(|(_, voices)| voices.clone())
    }

    async fn fetch_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        let api_key = self.api_key()?;

        debug!("Fetching voice list from provider");
        let response = self
            .client
            .get(self.url("/v1/voices"))
            .header(header::ACCEPT, "application/json")
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let response = ensure_success(response, "list voices").await?;
        let body: VoicesResponse = response.json().await?;
        Ok(body.voices)
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsClient {
    async fn list_voices(&self) -> Result<Vec<Voice>, ProviderError> {
        if let Some(voices) = self.cached_voices().await {
            return Ok(voices);
        }

        let voices = self.fetch_voices().await?;
        *self.voices_cache.write().await = Some((Instant::now(), voices.clone()));
        Ok(voices)
    }

    async fn synthesize(&self, input: &SynthesisInput) -> Result<Vec<u8>, ProviderError> {
        let api_key = self.api_key()?;

        let body = SynthesisBody {
            text: &input.text,
            model_id: &input.model_id,
            voice_settings: &input.settings,
        };

        debug!(
            voice_id = %input.voice_id,
            model_id = %input.model_id,
            chars = input.text.chars().count(),
            "Requesting speech synthesis"
        );

        let response = self
            .client
            .post(self.url(&format!("/v1/text-to-speech/{}", input.voice_id)))
            .header(header::ACCEPT, OUTPUT_MIME)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response, "text-to-speech").await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn convert(&self, input: &ConversionInput) -> Result<Vec<u8>, ProviderError> {
        use reqwest::multipart::{Form, Part};

        let api_key = self.api_key()?;

        let settings = serde_json::to_string(&input.settings).map_err(|e| {
            ProviderError::RequestFailed {
                status: None,
                message: format!("Failed to encode voice settings: {e}"),
            }
        })?;

        let audio = Part::bytes(input.audio.clone())
            .file_name(input.file_name.clone())
            .mime_str(&input.content_type)
            .map_err(|e| ProviderError::RequestFailed {
                status: None,
                message: format!("Invalid upload content type: {e}"),
            })?;

        let form = Form::new()
            .part("audio", audio)
            .text("model_id", input.model_id.clone())
            .text("voice_settings", settings);

        debug!(
            voice_id = %input.voice_id,
            model_id = %input.model_id,
            bytes = input.audio.len(),
            "Requesting voice conversion"
        );

        let response = self
            .client
            .post(self.url(&format!("/v1/speech-to-speech/{}", input.voice_id)))
            .header(header::ACCEPT, OUTPUT_MIME)
            .header(API_KEY_HEADER, api_key)
            .multipart(form)
            .send()
            .await?;

        let response = ensure_success(response, "speech-to-speech").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Turns a non-2xx response into `RequestFailed`, keeping the provider's
/// own explanation from the body.
async fn ensure_success(response: Response, operation: &str) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    warn!(operation, status = status.as_u16(), "Voice provider returned an error");

    let message = if detail.is_empty() {
        format!("{operation} returned HTTP {status}")
    } else {
        format!("{operation} returned HTTP {status}: {detail}")
    };

    Err(ProviderError::RequestFailed {
        status: Some(status.as_u16()),
        message,
    })
}
