//! Domain service for the admin user directory.
//!
//! Listing, creating, and deleting accounts. Deleting an account also drops
//! that user's generation history.

use serde::Serialize;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::models::UserSummary;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedUser {
    pub user: UserSummary,
    /// False when the credential file could not be written.
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedUser {
    pub username: String,
    pub purged_generations: usize,
    pub persisted: bool,
}

#[async_trait::async_trait]
pub trait UserDirectoryService: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserSummary>, DirectoryError>;

    /// # Errors
    ///
    /// Returns [`CredentialError::DuplicateUser`] if the name is taken.
    async fn create_user(&self, new_user: NewUser) -> Result<CreatedUser, DirectoryError>;

    /// # Errors
    ///
    /// Returns [`CredentialError::SelfDeletion`] when `username` is the
    /// requester and [`CredentialError::NotFound`] when it does not exist.
    async fn delete_user(
        &self,
        username: &str,
        requesting_username: &str,
    ) -> Result<DeletedUser, DirectoryError>;
}
