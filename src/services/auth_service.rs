//! Domain service for authentication.
//!
//! Checks credentials and reports the role of the user who logged in.

use thiserror::Error;

use crate::credentials::CredentialError;
use crate::models::UserSummary;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the user's summary.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or a
    /// wrong password alike.
    async fn login(&self, username: &str, password: &str) -> Result<UserSummary, AuthError>;

    /// The account currently stored under `username`, if any.
    async fn account(&self, username: &str) -> Result<Option<UserSummary>, AuthError>;
}
