pub mod generation;
pub mod user;

pub use generation::{GenerationKind, GenerationRecord, ModelOption, VoiceSettings};
pub use user::{AccountRef, UserRecord, UserSummary};
