use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::constants::history::LABEL_MAX_CHARS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    TextToSpeech,
    VoiceConversion,
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TextToSpeech => "text_to_speech",
            Self::VoiceConversion => "voice_conversion",
        };
        write!(f, "{s}")
    }
}

/// One successful synthesis or conversion, owned by a user's history.
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub prompt_or_source: String,
    pub voice_name: String,
    pub model_name: String,
    pub audio_payload: Vec<u8>,
    pub kind: GenerationKind,
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    #[must_use]
    pub fn text_to_speech(
        text: &str,
        voice_name: impl Into<String>,
        model_name: impl Into<String>,
        audio_payload: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt_or_source: prompt_label(text),
            voice_name: voice_name.into(),
            model_name: model_name.into(),
            audio_payload,
            kind: GenerationKind::TextToSpeech,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn voice_conversion(
        voice_name: impl Into<String>,
        model_name: impl Into<String>,
        audio_payload: Vec<u8>,
    ) -> Self {
        let voice_name = voice_name.into();
        Self {
            id: Uuid::new_v4(),
            prompt_or_source: format!("Conversion to {voice_name}"),
            voice_name,
            model_name: model_name.into(),
            audio_payload,
            kind: GenerationKind::VoiceConversion,
            created_at: Utc::now(),
        }
    }

    /// Suggested file name for downloads.
    #[must_use]
    pub fn download_name(&self) -> String {
        let voice: String = self
            .voice_name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();

        match self.kind {
            GenerationKind::TextToSpeech => format!("{voice}_{}.mp3", self.id.simple()),
            GenerationKind::VoiceConversion => {
                format!("converted_{voice}_{}.mp3", self.id.simple())
            }
        }
    }
}

/// Shortens a prompt to the history label form: the first 50 characters
/// followed by "..." when anything was cut.
#[must_use]
pub fn prompt_label(text: &str) -> String {
    if text.chars().count() > LABEL_MAX_CHARS {
        let head: String = text.chars().take(LABEL_MAX_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Provider-side tuning knobs, clamped to the ranges the provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub speed: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            speed: 1.0,
            use_speaker_boost: true,
        }
    }
}

impl VoiceSettings {
    pub const SPEED_MIN: f32 = 0.7;
    pub const SPEED_MAX: f32 = 1.2;

    /// Pulls every value into range; NaN falls back to the default.
    #[must_use]
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let clamp = |value: f32, min: f32, max: f32, fallback: f32| {
            if value.is_nan() {
                fallback
            } else {
                value.clamp(min, max)
            }
        };

        Self {
            stability: clamp(self.stability, 0.0, 1.0, defaults.stability),
            similarity_boost: clamp(self.similarity_boost, 0.0, 1.0, defaults.similarity_boost),
            style: clamp(self.style, 0.0, 1.0, defaults.style),
            speed: clamp(self.speed, Self::SPEED_MIN, Self::SPEED_MAX, defaults.speed),
            use_speaker_boost: self.use_speaker_boost,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelOption {
    pub id: &'static str,
    pub name: &'static str,
}

pub const MODEL_CATALOG: &[ModelOption] = &[
    ModelOption {
        id: "eleven_multilingual_v2",
        name: "Multilingual v2 (Enhanced)",
    },
    ModelOption {
        id: "eleven_monolingual_v1",
        name: "Monolingual v1 (English only)",
    },
    ModelOption {
        id: "eleven_multilingual_v1",
        name: "Multilingual v1 (Multiple languages)",
    },
    ModelOption {
        id: "eleven_turbo_v2",
        name: "Turbo (Faster generation)",
    },
];

#[must_use]
pub fn find_model(id: &str) -> Option<&'static ModelOption> {
    MODEL_CATALOG.iter().find(|m| m.id == id)
}

#[must_use]
pub fn default_model() -> &'static ModelOption {
    &MODEL_CATALOG[0]
}
