pub mod elevenlabs;

pub use elevenlabs::{
    ConversionInput, ElevenLabsClient, ProviderError, SynthesisInput, Voice, VoiceProvider,
};
