pub mod auth_service;
pub use auth_service::{AuthError, AuthService};

pub mod auth_service_impl;
pub use auth_service_impl::CredentialAuthService;

pub mod directory_service;
pub use directory_service::{DirectoryError, NewUser, UserDirectoryService};

pub mod directory_service_impl;
pub use directory_service_impl::CredentialDirectoryService;

pub mod generation_service;
pub use generation_service::{
    ConversionRequest, GenerationError, GenerationService, SpeechRequest,
};
